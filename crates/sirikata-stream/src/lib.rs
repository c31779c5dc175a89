//! The SST collaborator surface (§2, §6 glossary): ordered/unordered
//! reliable streams with substreams. This crate does not redesign the
//! transport — it gives the rest of the core a small, concrete
//! surface (`Endpoint`, `Connection`, `SubstreamId`) backed by
//! `qp2p`, a real QUIC-based reliable-datagram crate already used by
//! the teacher codebase for inter-node communication.

mod connection;
mod endpoint;
pub mod error;

pub use connection::{Connection, Ordering, SubstreamId};
pub use endpoint::{Endpoint, Received};
pub use error::Error;

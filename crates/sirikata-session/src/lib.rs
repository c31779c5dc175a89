//! Session Manager (§4.4): one active session per object to its
//! authoritative space server. Survives DCSEG handoff via a migration
//! protocol that carries the object's identity across the switch, and
//! follows redirects from a misaddressed initial connect attempt up to
//! a bounded retry budget.

mod connection;
mod error;
mod manager;
mod server_id_map;
mod strand;
mod timesync;

pub use connection::{Frame, SpaceNodeConnection};
pub use error::{Error, Result};
pub use manager::SessionManager;
pub use server_id_map::{ServerIDMap, StaticServerIDMap};
pub use strand::{spawn, SessionHandle};
pub use timesync::{ClockOffset, NoOpTimeSyncClient, TimeSyncClient};

//! Wire formats for the CSEG binary protocol (§6) and the
//! object<->space message fabric (§4.4, §6).

pub mod cseg_wire;
mod object_message;

pub use object_message::{ConnectResult, DisconnectCode, MigrateResult, ObjectMessage, SessionMsg};

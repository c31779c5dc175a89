//! The object<->space message fabric (§6): a generic `ObjectMessage`
//! envelope, and the tagged union of session-management payloads
//! exchanged by the session manager (§4.4).

use serde::{Deserialize, Serialize};
use sirikata_types::{ServerId, SpaceObjectReference};

/// A message routed between two endpoints (object or space server)
/// over a substream of the reliable stream fabric.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectMessage {
    pub source: SpaceObjectReference,
    pub source_port: u32,
    pub dest: SpaceObjectReference,
    pub dest_port: u32,
    pub unique_id: u64,
    pub payload: Vec<u8>,
}

impl ObjectMessage {
    pub fn new(
        source: SpaceObjectReference,
        source_port: u32,
        dest: SpaceObjectReference,
        dest_port: u32,
        unique_id: u64,
        payload: Vec<u8>,
    ) -> Self {
        Self { source, source_port, dest, dest_port, unique_id, payload }
    }
}

/// Why a session ended, surfaced to the object per §4.4/§7 — the sole
/// channel through which an object observes session failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectCode {
    /// The object asked to disconnect.
    Requested,
    /// `connect` exhausted its redirect-following retry budget.
    FailedToConnect,
    /// A migration directive could not be completed.
    MigrationFailed,
    /// The underlying connection was lost and reconnection did not
    /// succeed within the retry budget.
    Transient,
}

/// Result carried by a `ConnectResponse`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConnectResult {
    Success,
    /// The contacted server does not own this object's region;
    /// retry against `redirect_to` (§4.4 step 4).
    Redirect { redirect_to: ServerId },
    Failure { reason: String },
}

/// Result carried by a `MigrateResponse`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MigrateResult {
    Success,
    Failure { reason: String },
}

/// The session-management tagged union (§6). These are the only
/// payloads the session manager's `io` strand dispatches locally
/// without posting to `main`'s message handler (§4.4 receive path),
/// except where noted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SessionMsg {
    Connect { sporef: SpaceObjectReference, name: String },
    ConnectResponse { sporef: SpaceObjectReference, result: ConnectResult },
    MigrateRequest { sporef: SpaceObjectReference, new_server: ServerId },
    MigrateResponse { sporef: SpaceObjectReference, result: MigrateResult },
    Disconnect { sporef: SpaceObjectReference, code: DisconnectCode },
}

impl SessionMsg {
    pub fn sporef(&self) -> SpaceObjectReference {
        match self {
            Self::Connect { sporef, .. }
            | Self::ConnectResponse { sporef, .. }
            | Self::MigrateRequest { sporef, .. }
            | Self::MigrateResponse { sporef, .. }
            | Self::Disconnect { sporef, .. } => *sporef,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sirikata_types::{ObjectReference, SpaceId};
    use uuid::Uuid;

    fn sample_sporef() -> SpaceObjectReference {
        SpaceObjectReference::new(SpaceId(Uuid::new_v4()), ObjectReference::random())
    }

    #[test]
    fn session_msg_roundtrip() {
        let msg = SessionMsg::ConnectResponse {
            sporef: sample_sporef(),
            result: ConnectResult::Redirect { redirect_to: ServerId::assigned(5).unwrap() },
        };
        let bytes = bincode::serialize(&msg).unwrap();
        let back: SessionMsg = bincode::deserialize(&bytes).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn sporef_accessor_matches_every_variant() {
        let sporef = sample_sporef();
        let msg = SessionMsg::Disconnect { sporef, code: DisconnectCode::Transient };
        assert_eq!(msg.sporef(), sporef);
    }
}

use sirikata_types::{ServerId, SpaceObjectReference};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no known space servers to connect to")]
    NoKnownServers,
    #[error("stream error talking to {0:?}: {1}")]
    Stream(ServerId, #[source] sirikata_stream::Error),
    #[error("exhausted redirect retry budget connecting {0}")]
    FailedToConnect(SpaceObjectReference),
    #[error("migration of {0} failed: {1}")]
    MigrationFailed(SpaceObjectReference, String),
    #[error("{0} has no active session")]
    NotConnected(SpaceObjectReference),
    #[error("malformed frame: {0}")]
    Decode(#[from] bincode::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

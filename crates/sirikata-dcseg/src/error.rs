use sirikata_messaging::cseg_wire::WireError;
use sirikata_types::ServerId;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// §7's taxonomy, specialised to DCSEG.
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed CSEG frame: {0}")]
    Wire(#[from] WireError),
    #[error("i/o error talking to CSEG node {0}: {1}")]
    Io(std::net::SocketAddr, #[source] std::io::Error),
    #[error("no lower tree hosted locally for bbox hash {0}")]
    UnknownLowerTree(String),
    #[error("peer CSEG node for upper-tree leaf is unknown (no listen address registered)")]
    UnknownPeer,
    #[error("lookup against peer CSEG node timed out or failed; result is unknown")]
    LookupUnknown,
    #[error("availability pool exhausted: no ServerID left to assign")]
    PoolExhausted,
    #[error("segmentation tree invariant violated after applying a local change: {0}")]
    InvariantViolated(String),
    #[error("server {0} is not present in any local leaf")]
    NotFound(ServerId),
}

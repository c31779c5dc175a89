use std::net::SocketAddr;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Transient-network errors per §7's taxonomy: retry with bounded
/// backoff, surface as `Disconnect::Transient` if the budget is
/// exhausted.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to create the local reliable-stream endpoint: {0}")]
    EndpointCreation(#[from] qp2p::EndpointError),
    #[error("could not connect to {0}: {1}")]
    Connect(SocketAddr, #[source] qp2p::ConnectionError),
    #[error("send to {0} failed: {1}")]
    Send(SocketAddr, #[source] qp2p::SendError),
    #[error("connection to {0} closed")]
    ConnectionClosed(SocketAddr),
    #[error("malformed substream envelope: {0}")]
    Malformed(#[from] bincode::Error),
}

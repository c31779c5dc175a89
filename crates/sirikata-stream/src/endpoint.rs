//! The local reliable-stream endpoint: accepts inbound connections and
//! opens outbound ones, posting every inbound message to a channel
//! rather than handing callers a callback — so the `io` strand that
//! owns this endpoint never blocks whoever reads from the channel
//! (§5's suspension-point rule).

use crate::connection::{decode_envelope, Connection, Ordering, SubstreamId};
use crate::error::{Error, Result};
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// One inbound message, demultiplexed to its substream.
#[derive(Debug)]
pub struct Received {
    pub from: SocketAddr,
    pub substream: SubstreamId,
    pub ordering: Ordering,
    pub payload: Vec<u8>,
}

pub struct Endpoint {
    inner: qp2p::Endpoint,
    _accept_task: JoinHandle<()>,
}

impl Endpoint {
    /// Bind a listening endpoint and spawn the accept loop. Every
    /// message received on any connection (inbound or outbound) is
    /// posted to `received_tx`.
    pub async fn bind(local_addr: SocketAddr, received_tx: mpsc::Sender<Received>) -> Result<Self> {
        let (endpoint, incoming_connections, _contact) =
            qp2p::Endpoint::new_peer(local_addr, Vec::<SocketAddr>::new(), qp2p::Config::default())
                .await
                .map_err(Error::EndpointCreation)?;

        let accept_task = tokio::spawn(accept_loop(incoming_connections, received_tx));

        Ok(Self { inner: endpoint, _accept_task: accept_task })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.public_addr()
    }

    /// Open a connection to `remote`, spawning a reader task that
    /// forwards inbound messages on it to `received_tx` exactly as the
    /// accept loop does for inbound connections.
    pub async fn connect(
        &self,
        remote: SocketAddr,
        received_tx: mpsc::Sender<Received>,
    ) -> Result<Connection> {
        let (conn, incoming_msgs) = self
            .inner
            .connect_to(&remote)
            .await
            .map_err(|e| Error::Connect(remote, e))?;
        tokio::spawn(read_loop(remote, incoming_msgs, received_tx));
        Ok(Connection::new(remote, conn))
    }
}

async fn accept_loop(mut incoming: qp2p::IncomingConnections, received_tx: mpsc::Sender<Received>) {
    while let Some((connection, incoming_msgs)) = incoming.next().await {
        trace!(remote = %connection.remote_address(), "accepted inbound connection");
        tokio::spawn(read_loop(connection.remote_address(), incoming_msgs, received_tx.clone()));
    }
}

async fn read_loop(
    remote: SocketAddr,
    mut incoming_msgs: qp2p::ConnectionIncoming,
    received_tx: mpsc::Sender<Received>,
) {
    loop {
        match incoming_msgs.next().await {
            Ok(Some(bytes)) => match decode_envelope(bytes) {
                Ok(envelope) => {
                    let msg = Received {
                        from: remote,
                        substream: envelope.substream,
                        ordering: envelope.ordering,
                        payload: envelope.payload,
                    };
                    if received_tx.send(msg).await.is_err() {
                        debug!(%remote, "receiver dropped, closing read loop");
                        return;
                    }
                }
                Err(error) => {
                    warn!(%remote, %error, "dropping malformed frame");
                }
            },
            Ok(None) => {
                trace!(%remote, "connection closed");
                return;
            }
            Err(error) => {
                warn!(%remote, %error, "error reading from connection");
                return;
            }
        }
    }
}

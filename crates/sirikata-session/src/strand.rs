//! §4.4's strand split: socket I/O (accept/read loops inside
//! [`sirikata_stream::Endpoint`], plus [`SessionManager`]'s own
//! receive-dispatch task) is the `io` side; `SessionHandle`'s methods —
//! the API surface and the object/session-tree mutation behind it —
//! are the `main` side. Unlike `cseg-net`/`prox`, `main` here isn't one
//! serialized actor loop: each object's state lives in its own map
//! entry, so independent objects' `connect`/`send`/`migrate` calls
//! run concurrently without contending on a shared event loop.

use crate::error::Result;
use crate::manager::SessionManager;
use crate::server_id_map::ServerIDMap;
use crate::timesync::TimeSyncClient;
use sirikata_messaging::ObjectMessage;
use sirikata_types::{ServerId, SpaceObjectReference};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

/// The `main`-side handle every object/space-server caller holds.
/// Cloning is cheap — it's a reference to the shared manager.
#[derive(Clone)]
pub struct SessionHandle {
    manager: Arc<SessionManager>,
}

/// Bind a `SessionManager` and return its handle plus the channel that
/// receives every inbound [`ObjectMessage`] the `io` side couldn't
/// dispatch locally (§4.4 receive path: "post everything else to
/// main as handleServerMessage").
pub async fn spawn(
    local_addr: SocketAddr,
    server_id_map: Arc<dyn ServerIDMap>,
    time_sync: Arc<dyn TimeSyncClient>,
) -> Result<(SessionHandle, mpsc::Receiver<ObjectMessage>)> {
    let (object_messages_tx, object_messages_rx) = mpsc::channel(256);
    let manager = SessionManager::bind(local_addr, server_id_map, time_sync, object_messages_tx).await?;
    Ok((SessionHandle { manager }, object_messages_rx))
}

impl SessionHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.manager.local_addr()
    }

    pub async fn connect(&self, sporef: SpaceObjectReference, name: String) -> Result<()> {
        self.manager.connect(sporef, name).await
    }

    pub async fn migrate(&self, sporef: SpaceObjectReference, new_server: ServerId) -> Result<()> {
        self.manager.migrate(sporef, new_server).await
    }

    pub fn get_connected_server(&self, sporef: SpaceObjectReference) -> Option<ServerId> {
        self.manager.get_connected_server(sporef)
    }

    /// `dest_server` defaults to [`ServerId::ANY`], resolving to the
    /// object's own connected server (§4.4 send path).
    pub async fn send(
        &self,
        sporef: SpaceObjectReference,
        src_port: u32,
        dst: SpaceObjectReference,
        dst_port: u32,
        payload: Vec<u8>,
        dest_server: ServerId,
    ) -> Result<()> {
        self.manager.send(sporef, src_port, dst, dst_port, payload, dest_server).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_id_map::StaticServerIDMap;
    use crate::timesync::NoOpTimeSyncClient;
    use sirikata_types::{ObjectReference, SpaceId};
    use uuid::Uuid;

    #[tokio::test]
    async fn spawn_binds_a_local_address() {
        let (handle, _rx) = spawn(
            "127.0.0.1:0".parse().unwrap(),
            Arc::new(StaticServerIDMap::new([])),
            Arc::new(NoOpTimeSyncClient),
        )
        .await
        .unwrap();
        assert_eq!(handle.local_addr().ip().to_string(), "127.0.0.1");
    }

    #[tokio::test]
    async fn unconnected_object_has_no_server() {
        let (handle, _rx) = spawn(
            "127.0.0.1:0".parse().unwrap(),
            Arc::new(StaticServerIDMap::new([])),
            Arc::new(NoOpTimeSyncClient),
        )
        .await
        .unwrap();
        let sporef = SpaceObjectReference::new(SpaceId(Uuid::new_v4()), ObjectReference::random());
        assert_eq!(handle.get_connected_server(sporef), None);
    }
}

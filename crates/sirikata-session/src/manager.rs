//! The Session Manager (§4.4): one active session per object to its
//! authoritative space server, surviving DCSEG handoff via the
//! migration protocol. State lives in concurrent maps rather than
//! behind a single actor loop — `connect`/`migrate`/`send` for
//! different objects run concurrently, and each only ever touches its
//! own object's entry.

use crate::connection::{Frame, SpaceNodeConnection};
use crate::error::{Error, Result};
use crate::server_id_map::ServerIDMap;
use crate::timesync::TimeSyncClient;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use dashmap::DashMap;
use sirikata_messaging::{ConnectResult, MigrateResult, ObjectMessage, SessionMsg};
use sirikata_stream::{Endpoint, Received};
use sirikata_types::{ServerId, SpaceObjectReference};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// §4.4 step 4: bound on redirects followed before giving up, on top of
/// the backoff policy's own `max_elapsed_time`.
const MAX_REDIRECTS: usize = 8;
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SessionState {
    Disconnected,
    /// A connect or migrate exchange is in flight; sends for this
    /// object queue rather than fail (§4.4 migration: "flushes queued
    /// outbound on success").
    Connecting,
    Connected { server: ServerId },
}

struct QueuedSend {
    dst: SpaceObjectReference,
    dst_port: u32,
    src_port: u32,
    payload: Vec<u8>,
}

struct ObjectInfo {
    state: SessionState,
    outbound: VecDeque<QueuedSend>,
    next_unique_id: u64,
}

impl ObjectInfo {
    fn new() -> Self {
        Self { state: SessionState::Disconnected, outbound: VecDeque::new(), next_unique_id: 0 }
    }
}

pub struct SessionManager {
    endpoint: Endpoint,
    server_id_map: Arc<dyn ServerIDMap>,
    time_sync: Arc<dyn TimeSyncClient>,
    connections: DashMap<ServerId, Arc<SpaceNodeConnection>>,
    objects: DashMap<SpaceObjectReference, ObjectInfo>,
    pending_connect: DashMap<SpaceObjectReference, oneshot::Sender<ConnectResult>>,
    pending_migrate: DashMap<SpaceObjectReference, oneshot::Sender<MigrateResult>>,
    received_tx: mpsc::Sender<Received>,
    object_messages_tx: mpsc::Sender<ObjectMessage>,
}

impl SessionManager {
    /// Bind the local endpoint and start the receive-dispatch task.
    /// `object_messages_tx` is the "main" side's inbound channel —
    /// every frame that isn't session-management is forwarded there
    /// unopened (§4.4 receive path).
    pub async fn bind(
        local_addr: SocketAddr,
        server_id_map: Arc<dyn ServerIDMap>,
        time_sync: Arc<dyn TimeSyncClient>,
        object_messages_tx: mpsc::Sender<ObjectMessage>,
    ) -> Result<Arc<Self>> {
        let (received_tx, received_rx) = mpsc::channel(256);
        let endpoint = Endpoint::bind(local_addr, received_tx.clone())
            .await
            .map_err(|e| Error::Stream(ServerId::ANY, e))?;

        let manager = Arc::new(Self {
            endpoint,
            server_id_map,
            time_sync,
            connections: DashMap::new(),
            objects: DashMap::new(),
            pending_connect: DashMap::new(),
            pending_migrate: DashMap::new(),
            received_tx,
            object_messages_tx,
        });
        tokio::spawn(Self::dispatch(manager.clone(), received_rx));
        Ok(manager)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    async fn connection_to(&self, server: ServerId) -> Result<Arc<SpaceNodeConnection>> {
        if let Some(existing) = self.connections.get(&server) {
            return Ok(existing.clone());
        }
        let address = self.server_id_map.resolve(server).ok_or(Error::NoKnownServers)?;
        let addr: SocketAddr = format!("{address}").parse().map_err(|_| Error::NoKnownServers)?;
        let connection = self
            .endpoint
            .connect(addr, self.received_tx.clone())
            .await
            .map_err(|e| Error::Stream(server, e))?;
        let wrapped = Arc::new(SpaceNodeConnection::new(server, connection));
        self.connections.insert(server, wrapped.clone());
        Ok(wrapped)
    }

    /// §4.4 connect protocol: `getAnySpaceConnection` picks a random
    /// known server, time sync runs before the session is opened, and
    /// `openConnectionStartSession` follows redirects up to a bounded
    /// retry budget before giving up with `FailedToConnect`.
    pub async fn connect(self: &Arc<Self>, sporef: SpaceObjectReference, name: String) -> Result<()> {
        self.objects.insert(sporef, ObjectInfo::new());
        if let Some(mut info) = self.objects.get_mut(&sporef) {
            info.state = SessionState::Connecting;
        }

        let mut next_server = self.server_id_map.any_server().ok_or(Error::NoKnownServers)?;
        let mut backoff = ExponentialBackoff { max_elapsed_time: Some(Duration::from_secs(30)), ..Default::default() };

        for _ in 0..MAX_REDIRECTS {
            let conn = self.connection_to(next_server).await?;
            let _offset = self.time_sync.sync(next_server, conn.connection().remote_address()).await;

            match self.open_connection_start_session(&conn, sporef, &name).await {
                Ok(ConnectResult::Success) => {
                    if let Some(mut info) = self.objects.get_mut(&sporef) {
                        info.state = SessionState::Connected { server: next_server };
                    }
                    self.flush_outbound(sporef).await;
                    return Ok(());
                }
                Ok(ConnectResult::Redirect { redirect_to }) => {
                    debug!(%sporef, ?redirect_to, "connect redirected");
                    next_server = redirect_to;
                    match backoff.next_backoff() {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => break,
                    }
                }
                Ok(ConnectResult::Failure { reason }) => {
                    warn!(%sporef, %reason, "connect refused");
                    break;
                }
                Err(error) => {
                    warn!(%sporef, %error, "connect attempt failed");
                    break;
                }
            }
        }

        if let Some(mut info) = self.objects.get_mut(&sporef) {
            info.state = SessionState::Disconnected;
        }
        Err(Error::FailedToConnect(sporef))
    }

    async fn open_connection_start_session(
        &self,
        conn: &SpaceNodeConnection,
        sporef: SpaceObjectReference,
        name: &str,
    ) -> Result<ConnectResult> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending_connect.insert(sporef, reply_tx);

        if let Err(error) = conn.send_frame(&Frame::Session(SessionMsg::Connect { sporef, name: name.to_string() })).await {
            self.pending_connect.remove(&sporef);
            return Err(error);
        }

        match tokio::time::timeout(REPLY_TIMEOUT, reply_rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) | Err(_) => {
                self.pending_connect.remove(&sporef);
                Err(Error::FailedToConnect(sporef))
            }
        }
    }

    /// §4.4 migration: the space server pushes a directive naming
    /// `new_server`; the session is handed over carrying the original
    /// `sporef`, and queued outbound traffic flushes once the new
    /// session is open. `MigrationFailed` surfaces the failure without
    /// disturbing the (still-valid) old session state.
    pub async fn migrate(self: &Arc<Self>, sporef: SpaceObjectReference, new_server: ServerId) -> Result<()> {
        let conn = self.connection_to(new_server).await?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending_migrate.insert(sporef, reply_tx);
        if let Err(error) = conn.send_frame(&Frame::Session(SessionMsg::MigrateRequest { sporef, new_server })).await {
            self.pending_migrate.remove(&sporef);
            return Err(error);
        }

        let result = match tokio::time::timeout(REPLY_TIMEOUT, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) | Err(_) => {
                self.pending_migrate.remove(&sporef);
                return Err(Error::MigrationFailed(sporef, "no reply from new server".into()));
            }
        };

        match result {
            MigrateResult::Success => {
                if let Some(mut info) = self.objects.get_mut(&sporef) {
                    info.state = SessionState::Connected { server: new_server };
                }
                self.flush_outbound(sporef).await;
                Ok(())
            }
            MigrateResult::Failure { reason } => Err(Error::MigrationFailed(sporef, reason)),
        }
    }

    pub fn get_connected_server(&self, sporef: SpaceObjectReference) -> Option<ServerId> {
        match self.objects.get(&sporef)?.state {
            SessionState::Connected { server } => Some(server),
            _ => None,
        }
    }

    /// §4.4 send path. `dest_server = ServerId::ANY` resolves to the
    /// object's own connected server via `getConnectedServer`; a
    /// non-`ANY` value routes to that server directly regardless of
    /// `sporef`'s own session, matching the "half-open session
    /// management traffic" the connect/migrate exchanges send before
    /// their session reaches `Connected`.
    pub async fn send(
        self: &Arc<Self>,
        sporef: SpaceObjectReference,
        src_port: u32,
        dst: SpaceObjectReference,
        dst_port: u32,
        payload: Vec<u8>,
        dest_server: ServerId,
    ) -> Result<()> {
        let state = self.objects.get(&sporef).map(|info| info.state);
        let target = match state {
            Some(SessionState::Connected { server }) => {
                if dest_server.is_any() {
                    server
                } else {
                    dest_server
                }
            }
            Some(SessionState::Connecting) if !dest_server.is_any() => dest_server,
            Some(SessionState::Connecting) => {
                self.queue_outbound(sporef, src_port, dst, dst_port, payload);
                return Ok(());
            }
            _ => return Err(Error::NotConnected(sporef)),
        };

        let conn = self.connection_to(target).await?;
        let unique_id = self.next_unique_id(sporef);
        let msg = ObjectMessage::new(sporef, src_port, dst, dst_port, unique_id, payload);
        conn.send_frame(&Frame::Object(msg)).await
    }

    fn queue_outbound(&self, sporef: SpaceObjectReference, src_port: u32, dst: SpaceObjectReference, dst_port: u32, payload: Vec<u8>) {
        if let Some(mut info) = self.objects.get_mut(&sporef) {
            info.outbound.push_back(QueuedSend { dst, dst_port, src_port, payload });
        }
    }

    async fn flush_outbound(self: &Arc<Self>, sporef: SpaceObjectReference) {
        let queued: Vec<QueuedSend> = self
            .objects
            .get_mut(&sporef)
            .map(|mut info| info.outbound.drain(..).collect())
            .unwrap_or_default();

        for queued in queued {
            if let Err(error) = self.send(sporef, queued.src_port, queued.dst, queued.dst_port, queued.payload, ServerId::ANY).await
            {
                warn!(%sporef, %error, "dropping queued message that failed to flush");
            }
        }
    }

    fn next_unique_id(&self, sporef: SpaceObjectReference) -> u64 {
        self.objects
            .get_mut(&sporef)
            .map(|mut info| {
                let id = info.next_unique_id;
                info.next_unique_id += 1;
                id
            })
            .unwrap_or(0)
    }

    async fn dispatch(self: Arc<Self>, mut received_rx: mpsc::Receiver<Received>) {
        while let Some(received) = received_rx.recv().await {
            match Frame::decode(&received.payload) {
                Ok(Frame::Session(msg)) => self.handle_session_msg(msg),
                Ok(Frame::Object(msg)) => {
                    if self.object_messages_tx.send(msg).await.is_err() {
                        debug!("object message receiver dropped, discarding inbound message");
                    }
                }
                Err(error) => warn!(from = %received.from, %error, "dropping malformed frame"),
            }
        }
    }

    fn handle_session_msg(&self, msg: SessionMsg) {
        match msg {
            SessionMsg::ConnectResponse { sporef, result } => {
                if let Some((_, tx)) = self.pending_connect.remove(&sporef) {
                    let _ = tx.send(result);
                }
            }
            SessionMsg::MigrateResponse { sporef, result } => {
                if let Some((_, tx)) = self.pending_migrate.remove(&sporef) {
                    let _ = tx.send(result);
                }
            }
            SessionMsg::Disconnect { sporef, code } => {
                if let Some(mut info) = self.objects.get_mut(&sporef) {
                    info.state = SessionState::Disconnected;
                }
                warn!(%sporef, ?code, "session disconnected by server");
            }
            SessionMsg::Connect { sporef, .. } | SessionMsg::MigrateRequest { sporef, .. } => {
                debug!(%sporef, "ignoring inbound session-open request on an object-side manager");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_id_map::StaticServerIDMap;
    use crate::timesync::NoOpTimeSyncClient;
    use sirikata_types::{ObjectReference, SpaceId};
    use uuid::Uuid;

    fn sample_sporef() -> SpaceObjectReference {
        SpaceObjectReference::new(SpaceId(Uuid::new_v4()), ObjectReference::random())
    }

    async fn bind_manager(map: StaticServerIDMap) -> Arc<SessionManager> {
        let (tx, _rx) = mpsc::channel(16);
        SessionManager::bind("127.0.0.1:0".parse().unwrap(), Arc::new(map), Arc::new(NoOpTimeSyncClient), tx)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn connect_without_known_servers_fails() {
        let manager = bind_manager(StaticServerIDMap::new([])).await;
        let error = manager.connect(sample_sporef(), "alice".into()).await.unwrap_err();
        assert!(matches!(error, Error::NoKnownServers));
    }

    #[tokio::test]
    async fn send_before_any_connect_attempt_is_not_connected() {
        let manager = bind_manager(StaticServerIDMap::new([])).await;
        let sporef = sample_sporef();
        let error = manager.send(sporef, 0, sporef, 0, vec![1], ServerId::ANY).await.unwrap_err();
        assert!(matches!(error, Error::NotConnected(_)));
    }

    #[tokio::test]
    async fn get_connected_server_is_none_before_connecting() {
        let manager = bind_manager(StaticServerIDMap::new([])).await;
        assert_eq!(manager.get_connected_server(sample_sporef()), None);
    }
}

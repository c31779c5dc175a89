//! The `cseg-net` strand (§5): a single Tokio task owning
//! `CsegNodeState` exclusively. Every other component talks to it by
//! posting a [`CsegCommand`] and awaiting a reply, never by touching
//! the tree directly — mirroring §5's "the segmentation tree is
//! mutated only on the cseg-net strand."

use crate::error::Error;
use crate::net;
use crate::state::{CsegNodeState, LookupOutcome};
use sirikata_messaging::cseg_wire::{decode_bbox_list_reply, decode_server_id_reply, CsegRequest, SegmentationChangeMessage};
use sirikata_types::{BoundingBox, CsegNodeId, ServerId, Vector3};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub enum CsegCommand {
    Lookup { point: Vector3, reply: oneshot::Sender<ServerId> },
    NumServers { reply: oneshot::Sender<u32> },
    Region { reply: oneshot::Sender<BoundingBox> },
    ServerRegion { server: ServerId, reply: oneshot::Sender<Vec<BoundingBox>> },
    LlLookup { point: Vector3, bbox: BoundingBox, reply: oneshot::Sender<ServerId> },
    ApplySegmentationChange(SegmentationChangeMessage),
    RegisterPeer { node: CsegNodeId, addr: SocketAddr },
    RegisterListener { addr: SocketAddr },
}

/// Cheap, cloneable front door to a running `cseg-net` task.
#[derive(Clone)]
pub struct CsegNodeHandle {
    tx: mpsc::Sender<CsegCommand>,
}

impl CsegNodeHandle {
    pub async fn lookup(&self, point: Vector3) -> ServerId {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(CsegCommand::Lookup { point, reply }).await.is_err() {
            return ServerId::ANY;
        }
        rx.await.unwrap_or(ServerId::ANY)
    }

    pub async fn num_servers(&self) -> u32 {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(CsegCommand::NumServers { reply }).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    pub async fn region(&self) -> Option<BoundingBox> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(CsegCommand::Region { reply }).await.ok()?;
        rx.await.ok()
    }

    pub async fn server_region(&self, server: ServerId) -> Vec<BoundingBox> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(CsegCommand::ServerRegion { server, reply }).await.is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    pub async fn ll_lookup(&self, point: Vector3, bbox: BoundingBox) -> ServerId {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(CsegCommand::LlLookup { point, bbox, reply }).await.is_err() {
            return ServerId::ANY;
        }
        rx.await.unwrap_or(ServerId::ANY)
    }

    pub async fn register_peer(&self, node: CsegNodeId, addr: SocketAddr) {
        let _ = self.tx.send(CsegCommand::RegisterPeer { node, addr }).await;
    }

    pub async fn register_listener(&self, addr: SocketAddr) {
        let _ = self.tx.send(CsegCommand::RegisterListener { addr }).await;
    }

    pub async fn apply_segmentation_change(&self, msg: SegmentationChangeMessage) {
        let _ = self.tx.send(CsegCommand::ApplySegmentationChange(msg)).await;
    }
}

/// Spawn the `cseg-net` task. Returns a handle callers use to issue
/// commands, plus the task's `JoinHandle` for shutdown coordination.
pub fn spawn(state: CsegNodeState) -> (CsegNodeHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(256);
    let join = tokio::spawn(run(state, rx));
    (CsegNodeHandle { tx }, join)
}

async fn run(mut state: CsegNodeState, mut cmd_rx: mpsc::Receiver<CsegCommand>) {
    let interval_secs = state.config().maintenance_interval_secs.max(1);
    let mut maintenance = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(cmd) => handle_command(&mut state, cmd).await,
                    None => break,
                }
            }
            _ = maintenance.tick() => maintenance_tick(&mut state).await,
        }
    }
}

async fn handle_command(state: &mut CsegNodeState, cmd: CsegCommand) {
    match cmd {
        CsegCommand::Lookup { point, reply } => match state.lookup(point) {
            LookupOutcome::Local(server) => {
                let _ = reply.send(server);
            }
            LookupOutcome::Remote { node, bbox } => {
                match state.peer_addr(node) {
                    Some(addr) => {
                        tokio::spawn(async move {
                            let server = remote_lookup(addr, point, bbox).await.unwrap_or(ServerId::ANY);
                            let _ = reply.send(server);
                        });
                    }
                    None => {
                        warn!(?node, "no listen address registered for peer CSEG node; lookup is unknown");
                        let _ = reply.send(ServerId::ANY);
                    }
                }
            }
        },
        CsegCommand::NumServers { reply } => {
            let _ = reply.send(state.num_servers());
        }
        CsegCommand::Region { reply } => {
            let _ = reply.send(state.region());
        }
        CsegCommand::ServerRegion { server, reply } => {
            let _ = reply.send(state.server_region(server));
        }
        CsegCommand::LlLookup { point, bbox, reply } => {
            let _ = reply.send(state.lookup_in_lower(bbox, point).unwrap_or(ServerId::ANY));
        }
        CsegCommand::ApplySegmentationChange(msg) => {
            state.apply_segmentation_change(&msg);
        }
        CsegCommand::RegisterPeer { node, addr } => {
            state.register_peer(node, addr);
        }
        CsegCommand::RegisterListener { addr } => {
            state.register_listener(addr);
        }
    }
}

async fn maintenance_tick(state: &mut CsegNodeState) {
    let mut rng = rand::thread_rng();
    let msg = match state.maintenance_step(&mut rng) {
        Some(msg) => msg,
        None => return,
    };
    debug!(entries = msg.entries.len(), "segmentation change produced by maintenance");

    let targets: Vec<SocketAddr> = state.peer_addrs().chain(state.listener_addrs()).collect();
    for addr in targets {
        let msg = msg.clone();
        tokio::spawn(async move {
            let request = CsegRequest::SegmentationChange(msg);
            if let Err(error) = net::send_fire_and_forget(addr, &request).await {
                // §4.1 failure semantics: a broadcast-forwarding
                // failure is logged and the broadcast continues to
                // remaining peers, never treated as fatal.
                warn!(%addr, %error, "failed to forward segmentation change");
            }
        });
    }
}

/// §8 scenario 6: a failed lookup is retried once before the caller
/// falls back to the `ServerId::ANY` sentinel.
async fn remote_lookup(addr: SocketAddr, point: Vector3, bbox: BoundingBox) -> Result<ServerId, Error> {
    let request = CsegRequest::LlLookup { point, bbox };
    match net::request_reply(addr, &request).await {
        Ok(reply) => Ok(decode_server_id_reply(&reply)?),
        Err(error) => {
            warn!(%addr, %error, "LL_ lookup RPC failed; retrying once");
            let reply = net::request_reply(addr, &request).await?;
            Ok(decode_server_id_reply(&reply)?)
        }
    }
}

/// Issue a plain (non-`LL_`) lookup against a CSEG node over the
/// network — the path a space server or standalone client uses,
/// entering at the upper tree rather than a known lower tree.
pub async fn remote_lookup_entry(addr: SocketAddr, point: Vector3) -> Result<ServerId, Error> {
    let request = CsegRequest::Lookup { point };
    let reply = net::request_reply(addr, &request).await?;
    Ok(decode_server_id_reply(&reply)?)
}

pub async fn remote_server_region(addr: SocketAddr, server: ServerId) -> Result<Vec<BoundingBox>, Error> {
    let request = CsegRequest::ServerRegion { server };
    let reply = net::request_reply(addr, &request).await?;
    Ok(decode_bbox_list_reply(&reply)?)
}

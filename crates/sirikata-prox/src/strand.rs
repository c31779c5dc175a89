//! The `prox` strand (§5): a single Tokio task owning a
//! `ProximityEngine` exclusively, driven by a tick loop (default
//! 100ms) and independent static/dynamic rebuild loops (default
//! 3600s, §4.3). Every other component talks to it through
//! [`ProxHandle`].

use crate::engine::{ProximityEngine, QueryMigrationData};
use crate::handler::{BruteForceHandler, QueryHandler};
use crate::types::{ProximityEvent, SolidAngle};
use sirikata_loc::LocationServiceCache;
use sirikata_types::{Clock, QuerierId, SpaceObjectReference, Vector3};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::warn;

/// §4.3: the tick interval unless overridden.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);
/// §4.3: the rebuild interval unless overridden, applied independently
/// to the static and dynamic indices.
pub const DEFAULT_REBUILD_INTERVAL: Duration = Duration::from_secs(3600);

pub enum ProxCommand {
    TrackObject { object: SpaceObjectReference, speed: f32 },
    ReclassifyObject { object: SpaceObjectReference, speed: f32 },
    HandleDisconnectedObject { object: SpaceObjectReference },
    RegisterQuery {
        querier: QuerierId,
        center: Vector3,
        max_distance: Option<f32>,
        angle: SolidAngle,
        max_results: Option<u32>,
    },
    RemoveQuery { querier: QuerierId },
    PopEvents { querier: QuerierId, reply: oneshot::Sender<Vec<ProximityEvent>> },
    GenerateMigrationData { querier: QuerierId, reply: oneshot::Sender<Option<QueryMigrationData>> },
    ReceiveMigrationData(QueryMigrationData),
}

#[derive(Clone)]
pub struct ProxHandle {
    tx: mpsc::Sender<ProxCommand>,
}

impl ProxHandle {
    pub async fn track_object(&self, object: SpaceObjectReference, speed: f32) {
        let _ = self.tx.send(ProxCommand::TrackObject { object, speed }).await;
    }

    pub async fn reclassify_object(&self, object: SpaceObjectReference, speed: f32) {
        let _ = self.tx.send(ProxCommand::ReclassifyObject { object, speed }).await;
    }

    pub async fn handle_disconnected_object(&self, object: SpaceObjectReference) {
        let _ = self.tx.send(ProxCommand::HandleDisconnectedObject { object }).await;
    }

    pub async fn register_query(
        &self,
        querier: QuerierId,
        center: Vector3,
        max_distance: Option<f32>,
        angle: SolidAngle,
        max_results: Option<u32>,
    ) {
        let _ = self.tx.send(ProxCommand::RegisterQuery { querier, center, max_distance, angle, max_results }).await;
    }

    pub async fn remove_query(&self, querier: QuerierId) {
        let _ = self.tx.send(ProxCommand::RemoveQuery { querier }).await;
    }

    pub async fn pop_events(&self, querier: QuerierId) -> Vec<ProximityEvent> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(ProxCommand::PopEvents { querier, reply }).await.is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    pub async fn generate_migration_data(&self, querier: QuerierId) -> Option<QueryMigrationData> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ProxCommand::GenerateMigrationData { querier, reply }).await.ok()?;
        rx.await.ok().flatten()
    }

    pub async fn receive_migration_data(&self, data: QueryMigrationData) {
        let _ = self.tx.send(ProxCommand::ReceiveMigrationData(data)).await;
    }
}

/// Spawn the `prox` strand over `BruteForceHandler`, the only concrete
/// handler this crate ships.
pub fn spawn(
    cache: Arc<dyn LocationServiceCache>,
    tick_interval: Duration,
    rebuild_interval: Duration,
) -> (ProxHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(256);
    let engine = ProximityEngine::<BruteForceHandler>::new();
    let join = tokio::spawn(run(engine, cache, rx, tick_interval, rebuild_interval));
    (ProxHandle { tx }, join)
}

async fn run(
    mut engine: ProximityEngine<BruteForceHandler>,
    cache: Arc<dyn LocationServiceCache>,
    mut cmd_rx: mpsc::Receiver<ProxCommand>,
    tick_interval: Duration,
    rebuild_interval: Duration,
) {
    let clock = Clock::new();
    let mut tick = tokio::time::interval(tick_interval);
    let mut rebuild_static = tokio::time::interval(rebuild_interval);
    let mut rebuild_dynamic = tokio::time::interval(rebuild_interval);
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(cmd) => handle_command(&mut engine, cmd),
                    None => break,
                }
            }
            _ = tick.tick() => engine.tick(clock.now(), cache.as_ref()),
            _ = rebuild_static.tick() => engine.rebuild_static(),
            _ = rebuild_dynamic.tick() => engine.rebuild_dynamic(),
        }
    }
}

fn handle_command(engine: &mut ProximityEngine<BruteForceHandler>, cmd: ProxCommand) {
    match cmd {
        ProxCommand::TrackObject { object, speed } => engine.track_object(object, speed),
        ProxCommand::ReclassifyObject { object, speed } => engine.reclassify_object(object, speed),
        ProxCommand::HandleDisconnectedObject { object } => engine.handle_disconnected_object(object),
        ProxCommand::RegisterQuery { querier, center, max_distance, angle, max_results } => {
            if let Err(error) = engine.register_query(querier, center, max_distance, angle, max_results) {
                warn!(?querier, %error, "rejected query registration");
            }
        }
        ProxCommand::RemoveQuery { querier } => engine.remove_query(querier),
        ProxCommand::PopEvents { querier, reply } => {
            let _ = reply.send(engine.pop_events(querier));
        }
        ProxCommand::GenerateMigrationData { querier, reply } => {
            let _ = reply.send(engine.generate_migration_data(querier));
        }
        ProxCommand::ReceiveMigrationData(data) => {
            if let Err(error) = engine.receive_migration_data(data) {
                warn!(%error, "rejected migration data");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sirikata_loc::InMemoryLocationServiceCache;
    use sirikata_types::{BoundingSphere, ObjectReference, SpaceId, Time, TimedMotionQuaternion, TimedMotionVector};
    use uuid::Uuid;

    #[tokio::test]
    async fn tick_eventually_reports_an_addition() {
        let lsc = InMemoryLocationServiceCache::new();
        let object = SpaceObjectReference::new(SpaceId(Uuid::new_v4()), ObjectReference::random());
        lsc.add_object(
            object,
            1,
            TimedMotionVector::new(Time::ZERO, Vector3::new(1.0, 0.0, 0.0), Vector3::ZERO),
            TimedMotionQuaternion::new(Time::ZERO, sirikata_types::Quaternion::IDENTITY, Vector3::ZERO),
            BoundingSphere::new(Vector3::ZERO, 1.0),
        );
        let cache: Arc<dyn LocationServiceCache> = Arc::new(lsc);
        let (handle, _join) = spawn(cache, Duration::from_millis(10), Duration::from_secs(3600));

        handle.track_object(object, 0.0).await;
        let querier = QuerierId::Object(object);
        handle.register_query(querier, Vector3::ZERO, Some(10.0), SolidAngle::MIN, None).await;

        let immediate = handle.pop_events(querier).await;
        assert!(immediate.is_empty());

        tokio::time::sleep(Duration::from_millis(50)).await;
        let events = handle.pop_events(querier).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ProximityEvent::Addition { .. }));
    }
}

//! `ProximityEngine` (§4.3): owns the four `{server,object} x
//! {static,dynamic}` handlers, the static/dynamic classification of
//! every tracked object, and the `Subscribers` bookkeeping used to
//! decide which queries to notify when an object disconnects.

use crate::handler::{BruteForceHandler, QueryHandler};
use crate::types::{classify, ObjectClass, ProximityEvent, Query, SolidAngle};
use serde::{Deserialize, Serialize};
use sirikata_loc::LocationServiceCache;
use sirikata_types::{QuerierId, SpaceObjectReference, Time, Vector3};
use std::collections::{HashMap, HashSet};

/// A snapshot of one query's state, sized to cross the wire when an
/// object migrates away (§4.3, last paragraph: "migration-safe query
/// state transfer").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryMigrationData {
    pub querier: QuerierId,
    pub center: Vector3,
    pub max_distance: Option<f32>,
    pub angle: f32,
    pub max_results: Option<u32>,
    pub result_set: Vec<SpaceObjectReference>,
}

fn is_server_query(querier: QuerierId) -> bool {
    matches!(querier, QuerierId::Server(_))
}

/// Ties the four handlers together into the single entry point the
/// `prox` strand drives (§4.3, §5).
pub struct ProximityEngine<H: QueryHandler = BruteForceHandler> {
    server_static: H,
    server_dynamic: H,
    object_static: H,
    object_dynamic: H,
    object_class: HashMap<SpaceObjectReference, ObjectClass>,
    subscribers: HashMap<SpaceObjectReference, HashSet<QuerierId>>,
    /// Query parameters, keyed by querier — `Query` itself isn't
    /// `Clone` (it owns a per-handler event deque), so the engine
    /// keeps its own copy to answer `generate_migration_data` without
    /// reaching into a specific handler instance.
    query_params: HashMap<QuerierId, (Vector3, Option<f32>, SolidAngle, Option<u32>)>,
}

impl<H: QueryHandler + Default> Default for ProximityEngine<H> {
    fn default() -> Self {
        Self {
            server_static: H::default(),
            server_dynamic: H::default(),
            object_static: H::default(),
            object_dynamic: H::default(),
            object_class: HashMap::new(),
            subscribers: HashMap::new(),
            query_params: HashMap::new(),
        }
    }
}

impl<H: QueryHandler + Default> ProximityEngine<H> {
    pub fn new() -> Self {
        Self::default()
    }

    fn object_handler(&mut self, class: ObjectClass) -> &mut H {
        match class {
            ObjectClass::Static => &mut self.object_static,
            ObjectClass::Dynamic => &mut self.object_dynamic,
        }
    }

    fn server_handler(&mut self, class: ObjectClass) -> &mut H {
        match class {
            ObjectClass::Static => &mut self.server_static,
            ObjectClass::Dynamic => &mut self.server_dynamic,
        }
    }

    fn handler_pair(&mut self, class: ObjectClass) -> (&mut H, &mut H) {
        match class {
            ObjectClass::Static => (&mut self.server_static, &mut self.object_static),
            ObjectClass::Dynamic => (&mut self.server_dynamic, &mut self.object_dynamic),
        }
    }

    fn handler_for_querier(&mut self, querier: QuerierId, class: ObjectClass) -> &mut H {
        if is_server_query(querier) {
            self.server_handler(class)
        } else {
            self.object_handler(class)
        }
    }

    /// Begin tracking `object` as a query candidate at the given
    /// speed-derived classification.
    pub fn track_object(&mut self, object: SpaceObjectReference, speed: f32) {
        let class = classify(speed);
        self.object_class.insert(object, class);
        let (server, obj) = self.handler_pair(class);
        server.add_object(object);
        obj.add_object(object);
    }

    /// Stop tracking `object` entirely — e.g. it left the space
    /// (§4.3's `handleDisconnectedObject`, glossary `Transient`
    /// removal).
    pub fn handle_disconnected_object(&mut self, object: SpaceObjectReference) {
        let Some(class) = self.object_class.remove(&object) else { return };
        let (server, obj) = self.handler_pair(class);
        server.remove_object(object);
        obj.remove_object(object);
        self.subscribers.remove(&object);
    }

    /// Re-evaluate `object`'s static/dynamic class against its latest
    /// speed and move it between handler instances if it changed.
    /// Exactly one of the two handlers ever contains the object at a
    /// time (§4.3 "static/dynamic split" invariant).
    pub fn reclassify_object(&mut self, object: SpaceObjectReference, speed: f32) {
        let new_class = classify(speed);
        let old_class = match self.object_class.get(&object) {
            Some(c) => *c,
            None => return,
        };
        if old_class == new_class {
            return;
        }
        let (old_server, old_obj) = self.handler_pair(old_class);
        old_server.remove_object(object);
        old_obj.remove_object(object);
        let (new_server, new_obj) = self.handler_pair(new_class);
        new_server.add_object(object);
        new_obj.add_object(object);
        self.object_class.insert(object, new_class);
    }

    pub fn register_query(
        &mut self,
        querier: QuerierId,
        center: Vector3,
        max_distance: Option<f32>,
        angle: SolidAngle,
        max_results: Option<u32>,
    ) -> crate::error::Result<()> {
        if let Some(max_distance) = max_distance {
            if !(max_distance > 0.0) {
                return Err(crate::error::Error::InvalidQuery(format!(
                    "max_distance must be positive, got {max_distance}"
                )));
            }
        }
        if angle.0 < 0.0 {
            return Err(crate::error::Error::InvalidQuery(format!("angle must be non-negative, got {}", angle.0)));
        }
        self.query_params.insert(querier, (center, max_distance, angle, max_results));
        self.handler_for_querier(querier, ObjectClass::Static)
            .register_query(Query::new(querier, center, max_distance, angle, max_results));
        self.handler_for_querier(querier, ObjectClass::Dynamic)
            .register_query(Query::new(querier, center, max_distance, angle, max_results));
        Ok(())
    }

    pub fn remove_query(&mut self, querier: QuerierId) {
        self.handler_for_querier(querier, ObjectClass::Static).remove_query(querier);
        self.handler_for_querier(querier, ObjectClass::Dynamic).remove_query(querier);
        self.query_params.remove(&querier);
        for subs in self.subscribers.values_mut() {
            subs.remove(&querier);
        }
    }

    /// Re-evaluate every registered query. Called by the `prox` strand
    /// on the tick interval (default 100ms, §4.3).
    pub fn tick(&mut self, now: Time, cache: &dyn LocationServiceCache) {
        self.server_static.tick(now, cache);
        self.server_dynamic.tick(now, cache);
        self.object_static.tick(now, cache);
        self.object_dynamic.tick(now, cache);
    }

    /// Rebuild whatever index each handler keeps. Called on the
    /// rebuild loop (default 3600s, independently for static/dynamic,
    /// §4.3).
    pub fn rebuild_static(&mut self) {
        self.server_static.rebuild();
        self.object_static.rebuild();
    }

    pub fn rebuild_dynamic(&mut self) {
        self.server_dynamic.rebuild();
        self.object_dynamic.rebuild();
    }

    /// Drain pending events for one querier, updating `Subscribers`
    /// bookkeeping as events are observed.
    pub fn pop_events(&mut self, querier: QuerierId) -> Vec<ProximityEvent> {
        let mut events = self.handler_for_querier(querier, ObjectClass::Static).pop_events(querier);
        events.extend(self.handler_for_querier(querier, ObjectClass::Dynamic).pop_events(querier));
        for event in &events {
            let object = event.object();
            match event {
                ProximityEvent::Addition { .. } => {
                    self.subscribers.entry(object).or_default().insert(querier);
                }
                ProximityEvent::Removal { .. } => {
                    if let Some(subs) = self.subscribers.get_mut(&object) {
                        subs.remove(&querier);
                    }
                }
            }
        }
        events
    }

    /// The set of queriers currently subscribed to `object` — used to
    /// notify interested parties directly on disconnect, bypassing the
    /// usual tick-driven diff (§3 "Subscribers").
    pub fn subscribers_of(&self, object: SpaceObjectReference) -> Vec<QuerierId> {
        self.subscribers.get(&object).map(|s| s.iter().copied().collect()).unwrap_or_default()
    }

    /// Snapshot a query's state for transfer to the node an object is
    /// migrating to, so the destination doesn't re-emit additions for
    /// objects the querier already knows about (§4.3, P5). A query is
    /// registered into both the static and dynamic handler of its
    /// querier type, so the result set is their union.
    pub fn generate_migration_data(&mut self, querier: QuerierId) -> Option<QueryMigrationData> {
        let (center, max_distance, angle, max_results) = *self.query_params.get(&querier)?;
        let mut result_set = self.handler_for_querier(querier, ObjectClass::Static).result_set(querier).unwrap_or_default();
        result_set.extend(self.handler_for_querier(querier, ObjectClass::Dynamic).result_set(querier).unwrap_or_default());
        Some(QueryMigrationData { querier, center, max_distance, angle: angle.0, max_results, result_set })
    }

    pub fn receive_migration_data(&mut self, data: QueryMigrationData) -> crate::error::Result<()> {
        let angle = SolidAngle(data.angle);
        self.register_query(data.querier, data.center, data.max_distance, angle, data.max_results)?;
        self.handler_for_querier(data.querier, ObjectClass::Static)
            .seed_result_set(data.querier, data.result_set.clone());
        self.handler_for_querier(data.querier, ObjectClass::Dynamic).seed_result_set(data.querier, data.result_set);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sirikata_loc::InMemoryLocationServiceCache;
    use sirikata_types::{BoundingSphere, ObjectReference, ServerId, SpaceId, TimedMotionQuaternion, TimedMotionVector};
    use uuid::Uuid;

    fn object() -> SpaceObjectReference {
        SpaceObjectReference::new(SpaceId(Uuid::new_v4()), ObjectReference::random())
    }

    fn stationary(pos: Vector3) -> TimedMotionVector {
        TimedMotionVector::new(Time::ZERO, pos, Vector3::ZERO)
    }

    fn identity_orient() -> TimedMotionQuaternion {
        TimedMotionQuaternion::new(Time::ZERO, sirikata_types::Quaternion::IDENTITY, Vector3::ZERO)
    }

    #[test]
    fn static_and_dynamic_indices_are_mutually_exclusive() {
        let mut engine: ProximityEngine<BruteForceHandler> = ProximityEngine::new();
        let obj = object();
        engine.track_object(obj, 0.0);
        assert!(engine.object_static.contains_object(obj));
        assert!(!engine.object_dynamic.contains_object(obj));

        engine.reclassify_object(obj, 5.0);
        assert!(!engine.object_static.contains_object(obj));
        assert!(engine.object_dynamic.contains_object(obj));
    }

    #[test]
    fn server_query_sees_tracked_object_within_range() {
        let cache = InMemoryLocationServiceCache::new();
        let mut engine: ProximityEngine<BruteForceHandler> = ProximityEngine::new();
        let obj = object();
        cache.add_object(obj, 1, stationary(Vector3::new(1.0, 0.0, 0.0)), identity_orient(), BoundingSphere::new(Vector3::ZERO, 1.0));
        engine.track_object(obj, 0.0);

        let querier = QuerierId::Server(ServerId::assigned(3).unwrap());
        engine.register_query(querier, Vector3::ZERO, Some(10.0), SolidAngle::MIN, None).unwrap();
        engine.tick(Time::ZERO, &cache);
        let events = engine.pop_events(querier);
        assert_eq!(events.len(), 1);
        assert!(engine.subscribers_of(obj).contains(&querier));
    }

    #[test]
    fn disconnect_clears_subscribers() {
        let cache = InMemoryLocationServiceCache::new();
        let mut engine: ProximityEngine<BruteForceHandler> = ProximityEngine::new();
        let obj = object();
        cache.add_object(obj, 1, stationary(Vector3::ZERO), identity_orient(), BoundingSphere::new(Vector3::ZERO, 1.0));
        engine.track_object(obj, 0.0);
        let querier = QuerierId::Object(object());
        engine.register_query(querier, Vector3::ZERO, Some(10.0), SolidAngle::MIN, None).unwrap();
        engine.tick(Time::ZERO, &cache);
        engine.pop_events(querier);
        assert!(!engine.subscribers_of(obj).is_empty());

        engine.handle_disconnected_object(obj);
        assert!(engine.subscribers_of(obj).is_empty());
    }

    #[test]
    fn migration_snapshot_seeds_result_set_without_new_additions() {
        let cache = InMemoryLocationServiceCache::new();
        let mut source: ProximityEngine<BruteForceHandler> = ProximityEngine::new();
        let obj = object();
        cache.add_object(obj, 1, stationary(Vector3::new(1.0, 0.0, 0.0)), identity_orient(), BoundingSphere::new(Vector3::ZERO, 1.0));
        source.track_object(obj, 0.0);
        let querier = QuerierId::Object(object());
        source.register_query(querier, Vector3::ZERO, Some(10.0), SolidAngle::MIN, None).unwrap();
        source.tick(Time::ZERO, &cache);
        source.pop_events(querier);

        let snapshot = source.generate_migration_data(querier).expect("query was registered");
        assert_eq!(snapshot.result_set, vec![obj]);

        let mut dest: ProximityEngine<BruteForceHandler> = ProximityEngine::new();
        dest.track_object(obj, 0.0);
        dest.receive_migration_data(snapshot).unwrap();
        dest.tick(Time::ZERO, &cache);
        assert!(dest.pop_events(querier).is_empty());
    }
}

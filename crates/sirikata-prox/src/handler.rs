//! `QueryHandler` (§4.3): the interface each of the Proximity Engine's
//! four handlers implements, plus `BruteForceHandler`, the only
//! concrete handler this crate ships (an R-tree-backed handler is
//! future work the wire protocol's `"rtree"`/`"rtreedist"` handler
//! types already anticipate).

use crate::types::{ProximityEvent, Query, Transience};
use sirikata_loc::LocationServiceCache;
use sirikata_types::{QuerierId, SpaceObjectReference, Time};
use std::collections::{HashMap, HashSet};

/// The object index and query set a Proximity Engine handler owns.
/// One instance backs each of the four `{server,object} x
/// {static,dynamic}` slots (§4.3).
pub trait QueryHandler: Send {
    fn register_query(&mut self, query: Query);
    fn remove_query(&mut self, querier: QuerierId) -> Option<Query>;
    fn contains_query(&self, querier: QuerierId) -> bool;
    fn queriers(&self) -> Vec<QuerierId>;

    fn add_object(&mut self, object: SpaceObjectReference);
    fn remove_object(&mut self, object: SpaceObjectReference);
    fn contains_object(&self, object: SpaceObjectReference) -> bool;

    /// Re-evaluate every registered query against the current cache
    /// state, appending `Addition`/`Removal` events to each query's
    /// pending deque.
    fn tick(&mut self, now: Time, cache: &dyn LocationServiceCache);

    /// Rebuild whatever spatial index backs this handler. A no-op for
    /// `BruteForceHandler`, which has no index to rebuild; an R-tree
    /// handler would reconstruct its tree here (§4.3 "rebuild loop").
    fn rebuild(&mut self);

    fn pop_events(&mut self, querier: QuerierId) -> Vec<ProximityEvent>;

    /// The result set currently visible to `querier`, if registered —
    /// used to build migration snapshots (§4.3 last paragraph).
    fn result_set(&self, querier: QuerierId) -> Option<Vec<SpaceObjectReference>>;

    /// Pre-populate `querier`'s result set from migration data without
    /// emitting `Addition` events for the seeded objects.
    fn seed_result_set(&mut self, querier: QuerierId, objects: Vec<SpaceObjectReference>);
}

fn apparent_solid_angle(radius: f32, distance: f32) -> f32 {
    if distance <= f32::EPSILON {
        return f32::MAX;
    }
    (radius / distance).powi(2)
}

/// Evaluates every `(query, object)` pair on every tick. Correct by
/// construction and the natural baseline to validate a smarter handler
/// against; not meant to scale past a few thousand objects per handler.
#[derive(Default)]
pub struct BruteForceHandler {
    objects: HashSet<SpaceObjectReference>,
    queries: HashMap<QuerierId, Query>,
}

impl BruteForceHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn evaluate_query(
        objects: &HashSet<SpaceObjectReference>,
        query: &mut Query,
        now: Time,
        cache: &dyn LocationServiceCache,
    ) {
        let mut candidates: Vec<(SpaceObjectReference, f32)> = Vec::new();
        for &object in objects {
            if !cache.tracking(object) {
                continue;
            }
            let Some(entry) = cache.properties(object) else { continue };
            let pos = entry.location.position_at(now);
            let distance = (pos - query.center).length();
            if let Some(max_distance) = query.max_distance {
                if distance > max_distance {
                    continue;
                }
            } else {
                let angle = apparent_solid_angle(entry.bounds.radius, distance);
                if angle < query.angle.0 {
                    continue;
                }
            }
            candidates.push((object, distance));
        }
        candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        // §8: `max_results == 0` means unbounded, not "no results".
        if let Some(max_results) = query.max_results {
            if max_results > 0 {
                candidates.truncate(max_results as usize);
            }
        }
        let visible: HashSet<SpaceObjectReference> = candidates.iter().map(|(o, _)| *o).collect();

        for &object in &visible {
            if query.result_set.contains(&object) {
                continue;
            }
            let Some(entry) = cache.properties(object) else { continue };
            query.events.push_back(ProximityEvent::Addition {
                object,
                seqno: entry.max_seq_no(),
                loc: entry.location,
                orient: entry.orientation,
                bounds: entry.bounds,
                mesh: entry.mesh.clone(),
            });
        }
        let departed: Vec<SpaceObjectReference> =
            query.result_set.iter().filter(|o| !visible.contains(o)).copied().collect();
        for object in departed {
            let seqno = cache.properties(object).map(|e| e.max_seq_no()).unwrap_or(0);
            query.events.push_back(ProximityEvent::Removal { object, seqno, transience: Transience::Permanent });
        }
        query.result_set = visible;
    }
}

impl QueryHandler for BruteForceHandler {
    fn register_query(&mut self, query: Query) {
        self.queries.insert(query.querier, query);
    }

    fn remove_query(&mut self, querier: QuerierId) -> Option<Query> {
        self.queries.remove(&querier)
    }

    fn contains_query(&self, querier: QuerierId) -> bool {
        self.queries.contains_key(&querier)
    }

    fn queriers(&self) -> Vec<QuerierId> {
        self.queries.keys().copied().collect()
    }

    fn add_object(&mut self, object: SpaceObjectReference) {
        self.objects.insert(object);
    }

    fn remove_object(&mut self, object: SpaceObjectReference) {
        self.objects.remove(&object);
        for query in self.queries.values_mut() {
            if query.result_set.remove(&object) {
                query.events.push_back(ProximityEvent::Removal {
                    object,
                    seqno: u64::MAX,
                    transience: Transience::Transient,
                });
            }
        }
    }

    fn contains_object(&self, object: SpaceObjectReference) -> bool {
        self.objects.contains(&object)
    }

    fn tick(&mut self, now: Time, cache: &dyn LocationServiceCache) {
        let objects = &self.objects;
        for query in self.queries.values_mut() {
            Self::evaluate_query(objects, query, now, cache);
        }
    }

    fn rebuild(&mut self) {}

    fn pop_events(&mut self, querier: QuerierId) -> Vec<ProximityEvent> {
        self.queries.get_mut(&querier).map(|q| q.pop_events()).unwrap_or_default()
    }

    fn result_set(&self, querier: QuerierId) -> Option<Vec<SpaceObjectReference>> {
        self.queries.get(&querier).map(|q| q.result_set.iter().copied().collect())
    }

    fn seed_result_set(&mut self, querier: QuerierId, objects: Vec<SpaceObjectReference>) {
        if let Some(query) = self.queries.get_mut(&querier) {
            query.seed_result_set(objects);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SolidAngle;
    use sirikata_loc::InMemoryLocationServiceCache;
    use sirikata_types::{BoundingSphere, ObjectReference, SpaceId, TimedMotionQuaternion, TimedMotionVector, Vector3};
    use uuid::Uuid;

    fn object() -> SpaceObjectReference {
        SpaceObjectReference::new(SpaceId(Uuid::new_v4()), ObjectReference::random())
    }

    fn querier() -> QuerierId {
        QuerierId::Object(object())
    }

    fn stationary_at(pos: Vector3) -> TimedMotionVector {
        TimedMotionVector::new(Time::ZERO, pos, Vector3::ZERO)
    }

    fn identity_orient() -> TimedMotionQuaternion {
        TimedMotionQuaternion::new(Time::ZERO, sirikata_types::Quaternion::IDENTITY, Vector3::ZERO)
    }

    #[test]
    fn distance_capped_query_only_sees_nearby_objects() {
        let cache = InMemoryLocationServiceCache::new();
        let near = object();
        let far = object();
        cache.add_object(near, 1, stationary_at(Vector3::new(1.0, 0.0, 0.0)), identity_orient(), BoundingSphere::new(Vector3::ZERO, 1.0));
        cache.add_object(far, 1, stationary_at(Vector3::new(100.0, 0.0, 0.0)), identity_orient(), BoundingSphere::new(Vector3::ZERO, 1.0));

        let mut handler = BruteForceHandler::new();
        handler.add_object(near);
        handler.add_object(far);
        let q = Query::new(querier(), Vector3::ZERO, Some(10.0), SolidAngle::MIN, None);
        let qid = q.querier;
        handler.register_query(q);

        handler.tick(Time::ZERO, &cache);
        let events = handler.pop_events(qid);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].object(), near);
    }

    #[test]
    fn object_leaving_range_generates_removal() {
        let cache = InMemoryLocationServiceCache::new();
        let obj = object();
        cache.add_object(obj, 1, stationary_at(Vector3::new(1.0, 0.0, 0.0)), identity_orient(), BoundingSphere::new(Vector3::ZERO, 1.0));

        let mut handler = BruteForceHandler::new();
        handler.add_object(obj);
        let q = Query::new(querier(), Vector3::ZERO, Some(10.0), SolidAngle::MIN, None);
        let qid = q.querier;
        handler.register_query(q);
        handler.tick(Time::ZERO, &cache);
        assert_eq!(handler.pop_events(qid).len(), 1);

        cache.update_location(obj, 2, stationary_at(Vector3::new(1000.0, 0.0, 0.0)));
        handler.tick(Time::ZERO, &cache);
        let events = handler.pop_events(qid);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ProximityEvent::Removal { .. }));
    }

    #[test]
    fn max_results_caps_to_nearest_objects() {
        let cache = InMemoryLocationServiceCache::new();
        let mut handler = BruteForceHandler::new();
        for i in 1..=5 {
            let obj = object();
            cache.add_object(obj, 1, stationary_at(Vector3::new(i as f32, 0.0, 0.0)), identity_orient(), BoundingSphere::new(Vector3::ZERO, 1.0));
            handler.add_object(obj);
        }
        let q = Query::new(querier(), Vector3::ZERO, Some(100.0), SolidAngle::MIN, Some(2));
        let qid = q.querier;
        handler.register_query(q);
        handler.tick(Time::ZERO, &cache);
        assert_eq!(handler.pop_events(qid).len(), 2);
    }

    #[test]
    fn untracked_objects_are_skipped() {
        let cache = InMemoryLocationServiceCache::new();
        let obj = object();
        cache.add_object(obj, 1, stationary_at(Vector3::ZERO), identity_orient(), BoundingSphere::new(Vector3::ZERO, 1.0));
        cache.remove_object(obj, true);

        let mut handler = BruteForceHandler::new();
        handler.add_object(obj);
        let q = Query::new(querier(), Vector3::ZERO, Some(10.0), SolidAngle::MIN, None);
        let qid = q.querier;
        handler.register_query(q);
        handler.tick(Time::ZERO, &cache);
        assert!(handler.pop_events(qid).is_empty());
    }
}

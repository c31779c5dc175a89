//! The Location Service Cache itself (§4.2, §3 "Location cache
//! entries"). `LocationServiceCache` is the trait both the locally
//! authoritative cache and a migration-fed replica implement, so
//! Proximity and Session code is agnostic to which one backs a query
//! (SPEC_FULL §4.2).

use crate::listener::LocationUpdateListener;
use dashmap::DashMap;
use sirikata_types::{BoundingSphere, SpaceObjectReference, TimedMotionQuaternion, TimedMotionVector};
use std::sync::{Arc, RwLock};

#[derive(Clone, Debug)]
pub struct LocationEntry {
    pub location: TimedMotionVector,
    pub orientation: TimedMotionQuaternion,
    pub bounds: BoundingSphere,
    pub mesh: Option<String>,
    pub physics: Option<Vec<u8>>,
    pub seqno: u64,
    pub tracking: bool,
}

impl LocationEntry {
    pub fn max_seq_no(&self) -> u64 {
        self.seqno
    }
}

pub trait LocationServiceCache: Send + Sync {
    fn properties(&self, object: SpaceObjectReference) -> Option<LocationEntry>;
    fn tracking(&self, object: SpaceObjectReference) -> bool;
    fn add_listener(&self, listener: Arc<dyn LocationUpdateListener>);
    /// Every currently-tracked object and its entry. The brute-force
    /// proximity handler is the only consumer that needs a full scan;
    /// an `RTreeLocationServiceCache` would instead expose a spatial
    /// query and leave this as an expensive fallback.
    fn tracked_entries(&self) -> Vec<(SpaceObjectReference, LocationEntry)>;
}

/// An in-memory LSC backed by a `DashMap` keyed by object, per-entry
/// guarded — the one piece of state §5 allows to be shared mutable
/// state across strands, rather than owned by exactly one strand.
pub struct InMemoryLocationServiceCache {
    entries: DashMap<SpaceObjectReference, LocationEntry>,
    listeners: RwLock<Vec<Arc<dyn LocationUpdateListener>>>,
}

impl Default for InMemoryLocationServiceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLocationServiceCache {
    pub fn new() -> Self {
        Self { entries: DashMap::new(), listeners: RwLock::new(Vec::new()) }
    }

    fn for_each_listener(&self, f: impl Fn(&Arc<dyn LocationUpdateListener>)) {
        let listeners = self.listeners.read().expect("listener lock poisoned");
        for l in listeners.iter() {
            f(l);
        }
    }

    /// Begin tracking a new object. A second `add_object` for an
    /// already-tracked object is a no-op (idempotent replay after
    /// migration, §4.3's migration contract).
    pub fn add_object(
        &self,
        object: SpaceObjectReference,
        seqno: u64,
        location: TimedMotionVector,
        orientation: TimedMotionQuaternion,
        bounds: BoundingSphere,
    ) {
        let is_new = !self.entries.contains_key(&object);
        self.entries.insert(
            object,
            LocationEntry {
                location,
                orientation,
                bounds,
                mesh: None,
                physics: None,
                seqno,
                tracking: true,
            },
        );
        if is_new {
            self.for_each_listener(|l| l.on_object_added(object));
        }
    }

    /// Marks the object no longer known. The entry is retained as a
    /// tombstone (so `max_seq_no` stays available for in-flight event
    /// annotation) but `tracking` flips false, which is what
    /// Proximity's event-generation step checks before emitting an
    /// addition (§4.3 step 2).
    pub fn remove_object(&self, object: SpaceObjectReference, permanent: bool) {
        if let Some(mut entry) = self.entries.get_mut(&object) {
            entry.tracking = false;
        }
        self.for_each_listener(|l| l.on_object_removed(object, permanent));
    }

    /// Applies a location update if `seqno` is newer than the current
    /// one; drops (and returns `false` for) stale/duplicate updates
    /// per §3's out-of-order rule.
    pub fn update_location(&self, object: SpaceObjectReference, seqno: u64, loc: TimedMotionVector) -> bool {
        if !self.accept_seqno(object, seqno) {
            return false;
        }
        if let Some(mut entry) = self.entries.get_mut(&object) {
            entry.location = loc;
            entry.seqno = seqno;
        }
        self.for_each_listener(|l| l.on_location_updated(object, loc));
        true
    }

    pub fn update_bounds(&self, object: SpaceObjectReference, seqno: u64, bounds: BoundingSphere) -> bool {
        if !self.accept_seqno(object, seqno) {
            return false;
        }
        if let Some(mut entry) = self.entries.get_mut(&object) {
            entry.bounds = bounds;
            entry.seqno = seqno;
        }
        self.for_each_listener(|l| l.on_bounds_updated(object, bounds));
        true
    }

    pub fn update_orientation(
        &self,
        object: SpaceObjectReference,
        seqno: u64,
        orient: TimedMotionQuaternion,
    ) -> bool {
        if !self.accept_seqno(object, seqno) {
            return false;
        }
        if let Some(mut entry) = self.entries.get_mut(&object) {
            entry.orientation = orient;
            entry.seqno = seqno;
        }
        self.for_each_listener(|l| l.on_orientation_updated(object, orient));
        true
    }

    pub fn update_mesh(&self, object: SpaceObjectReference, seqno: u64, mesh: Option<String>) -> bool {
        if !self.accept_seqno(object, seqno) {
            return false;
        }
        if let Some(mut entry) = self.entries.get_mut(&object) {
            entry.mesh = mesh.clone();
            entry.seqno = seqno;
        }
        self.for_each_listener(|l| l.on_mesh_updated(object, mesh.clone()));
        true
    }

    pub fn update_physics(&self, object: SpaceObjectReference, seqno: u64, physics: Option<Vec<u8>>) -> bool {
        if !self.accept_seqno(object, seqno) {
            return false;
        }
        if let Some(mut entry) = self.entries.get_mut(&object) {
            entry.physics = physics.clone();
            entry.seqno = seqno;
        }
        self.for_each_listener(|l| l.on_physics_updated(object, physics.clone()));
        true
    }

    fn accept_seqno(&self, object: SpaceObjectReference, seqno: u64) -> bool {
        match self.entries.get(&object) {
            Some(entry) => seqno > entry.seqno,
            None => true,
        }
    }
}

impl LocationServiceCache for InMemoryLocationServiceCache {
    fn properties(&self, object: SpaceObjectReference) -> Option<LocationEntry> {
        self.entries.get(&object).map(|e| e.clone())
    }

    fn tracking(&self, object: SpaceObjectReference) -> bool {
        self.entries.get(&object).map(|e| e.tracking).unwrap_or(false)
    }

    fn add_listener(&self, listener: Arc<dyn LocationUpdateListener>) {
        self.listeners.write().expect("listener lock poisoned").push(listener);
    }

    fn tracked_entries(&self) -> Vec<(SpaceObjectReference, LocationEntry)> {
        self.entries
            .iter()
            .filter(|e| e.tracking)
            .map(|e| (*e.key(), e.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sirikata_types::{ObjectReference, SpaceId, Time, Vector3};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn sample_object() -> SpaceObjectReference {
        SpaceObjectReference::new(SpaceId(Uuid::new_v4()), ObjectReference::random())
    }

    fn sample_loc() -> TimedMotionVector {
        TimedMotionVector::new(Time::ZERO, Vector3::ZERO, Vector3::ZERO)
    }

    fn sample_orient() -> TimedMotionQuaternion {
        TimedMotionQuaternion::new(Time::ZERO, sirikata_types::Quaternion::IDENTITY, Vector3::ZERO)
    }

    struct CountingListener {
        adds: AtomicUsize,
        removes: AtomicUsize,
    }

    impl LocationUpdateListener for CountingListener {
        fn on_object_added(&self, _object: SpaceObjectReference) {
            self.adds.fetch_add(1, Ordering::SeqCst);
        }
        fn on_object_removed(&self, _object: SpaceObjectReference, _permanent: bool) {
            self.removes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn out_of_order_updates_are_dropped() {
        let cache = InMemoryLocationServiceCache::new();
        let obj = sample_object();
        cache.add_object(obj, 5, sample_loc(), sample_orient(), BoundingSphere::new(Vector3::ZERO, 1.0));
        assert!(!cache.update_location(obj, 5, sample_loc()));
        assert!(!cache.update_location(obj, 3, sample_loc()));
        assert!(cache.update_location(obj, 6, sample_loc()));
    }

    #[test]
    fn removed_objects_stop_tracking_but_keep_seqno() {
        let cache = InMemoryLocationServiceCache::new();
        let obj = sample_object();
        cache.add_object(obj, 1, sample_loc(), sample_orient(), BoundingSphere::new(Vector3::ZERO, 1.0));
        cache.remove_object(obj, true);
        assert!(!cache.tracking(obj));
        assert_eq!(cache.properties(obj).unwrap().max_seq_no(), 1);
    }

    #[test]
    fn listeners_see_add_and_remove_exactly_once() {
        let cache = InMemoryLocationServiceCache::new();
        let listener = Arc::new(CountingListener { adds: AtomicUsize::new(0), removes: AtomicUsize::new(0) });
        cache.add_listener(listener.clone());
        let obj = sample_object();
        cache.add_object(obj, 1, sample_loc(), sample_orient(), BoundingSphere::new(Vector3::ZERO, 1.0));
        cache.add_object(obj, 2, sample_loc(), sample_orient(), BoundingSphere::new(Vector3::ZERO, 1.0));
        cache.remove_object(obj, false);
        assert_eq!(listener.adds.load(Ordering::SeqCst), 1);
        assert_eq!(listener.removes.load(Ordering::SeqCst), 1);
    }
}

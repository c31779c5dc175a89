//! Listener interface invoked on every cache mutation (§4.2). All
//! methods have no-op default bodies so a listener only needs to
//! implement the notifications it cares about.

use sirikata_types::{BoundingSphere, SpaceObjectReference, TimedMotionQuaternion, TimedMotionVector};

pub trait LocationUpdateListener: Send + Sync {
    fn on_location_updated(&self, _object: SpaceObjectReference, _loc: TimedMotionVector) {}
    fn on_bounds_updated(&self, _object: SpaceObjectReference, _bounds: BoundingSphere) {}
    fn on_orientation_updated(&self, _object: SpaceObjectReference, _orient: TimedMotionQuaternion) {}
    fn on_mesh_updated(&self, _object: SpaceObjectReference, _mesh: Option<String>) {}
    fn on_physics_updated(&self, _object: SpaceObjectReference, _physics: Option<Vec<u8>>) {}
    fn on_object_added(&self, _object: SpaceObjectReference) {}
    /// `permanent` distinguishes an authoritative departure from a
    /// transient one (§4.3's `Transient`/`Permanent` removal split);
    /// the LSC itself doesn't interpret this, it just forwards it.
    fn on_object_removed(&self, _object: SpaceObjectReference, _permanent: bool) {}
}

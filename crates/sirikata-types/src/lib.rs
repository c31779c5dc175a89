//! Identifiers and geometry primitives shared across the space
//! partitioning and proximity core.

mod clock;
mod geometry;
mod ids;

pub use clock::Clock;
pub use geometry::{
    BoundingBox, BoundingSphere, Quaternion, Time, TimedMotionQuaternion, TimedMotionVector,
    UpAxis, Vector3,
};
pub use ids::{Address4, CsegNodeId, ObjectReference, QuerierId, ServerId, SpaceId, SpaceObjectReference};

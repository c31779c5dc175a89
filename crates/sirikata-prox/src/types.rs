//! Query and event shapes for the Proximity Engine (§3 "Query state",
//! §4.3).

use sirikata_types::{BoundingSphere, QuerierId, SpaceObjectReference, TimedMotionQuaternion, TimedMotionVector};
use std::collections::{HashSet, VecDeque};

/// A threshold on an object's apparent solid angle as seen from a
/// query's center (§4.3 "Query-distance mode"). The predicate used
/// throughout this crate is "object passes if its apparent angle is
/// `>=` the query's threshold" — so a threshold of zero is the most
/// permissive query possible.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolidAngle(pub f32);

impl SolidAngle {
    /// The most permissive angle: every object satisfies it. Used
    /// when a wire query omits `angle` entirely.
    pub const MAX: SolidAngle = SolidAngle(0.0);
    /// Registered for distance-capped handler types ("dist" /
    /// "rtreedist"); `BruteForceHandler` skips the angle predicate
    /// entirely whenever a query carries a distance cap, so this
    /// value is never actually evaluated — it exists only so those
    /// queries have *some* angle to store.
    pub const MIN: SolidAngle = SolidAngle(0.0);
}

/// Sentinel wire value for `max_results` meaning "leave the
/// previously registered value unchanged" (§4.3).
pub const NO_UPDATE_MAX_RESULTS: u32 = i32::MAX as u32 + 1;

/// Whether a removal may later be undone by a fresh `Addition` for the
/// same object, or definitively asserts the object is gone (glossary).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transience {
    Permanent,
    Transient,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectClass {
    Static,
    Dynamic,
}

/// Below this speed (m/s) an object is classified `Static` (§4.3
/// "Static/dynamic split").
pub const STATIC_SPEED_EPSILON: f32 = 0.01;

pub fn classify(speed: f32) -> ObjectClass {
    if speed < STATIC_SPEED_EPSILON {
        ObjectClass::Static
    } else {
        ObjectClass::Dynamic
    }
}

/// One event popped from a query's result-set diff (§4.3 "Event
/// generation").
#[derive(Clone, Debug, PartialEq)]
pub enum ProximityEvent {
    Addition {
        object: SpaceObjectReference,
        seqno: u64,
        loc: TimedMotionVector,
        orient: TimedMotionQuaternion,
        bounds: BoundingSphere,
        mesh: Option<String>,
    },
    Removal {
        object: SpaceObjectReference,
        seqno: u64,
        transience: Transience,
    },
}

impl ProximityEvent {
    pub fn object(&self) -> SpaceObjectReference {
        match self {
            ProximityEvent::Addition { object, .. } => *object,
            ProximityEvent::Removal { object, .. } => *object,
        }
    }
}

/// A registered query (§3 "Query state"): `(querier_id, region_center,
/// max_radius, solid_angle, max_results, listener)` plus the live
/// result set and pending event deque.
pub struct Query {
    pub querier: QuerierId,
    pub center: sirikata_types::Vector3,
    pub max_distance: Option<f32>,
    pub angle: SolidAngle,
    pub max_results: Option<u32>,
    pub(crate) result_set: HashSet<SpaceObjectReference>,
    pub(crate) events: VecDeque<ProximityEvent>,
}

impl Query {
    pub fn new(
        querier: QuerierId,
        center: sirikata_types::Vector3,
        max_distance: Option<f32>,
        angle: SolidAngle,
        max_results: Option<u32>,
    ) -> Self {
        Self { querier, center, max_distance, angle, max_results, result_set: HashSet::new(), events: VecDeque::new() }
    }

    /// Drain every pending event. The returned `Vec` preserves
    /// insertion order (FIFO within a query, §5 "within a strand:
    /// FIFO").
    pub fn pop_events(&mut self) -> Vec<ProximityEvent> {
        self.events.drain(..).collect()
    }

    pub fn contains(&self, object: SpaceObjectReference) -> bool {
        self.result_set.contains(&object)
    }

    /// Pre-populate the result set without emitting `Addition` events
    /// for its members — used when seeding a query from migration data
    /// so the destination doesn't re-announce objects the querier
    /// already knew about (§4.3, P5).
    pub fn seed_result_set(&mut self, objects: impl IntoIterator<Item = SpaceObjectReference>) {
        self.result_set.extend(objects);
    }
}

//! Placeholder mesh representation and the per-object tree state the
//! manager schedules composition over.

use sirikata_types::{BoundingSphere, ObjectReference, UpAxis, Vector3};

/// Triangle budget a composed aggregate is simplified down to before
/// upload — the original's `mMeshSimplifier.simplify(agg_mesh, 20000)`.
pub const TRIANGLE_BUDGET: usize = 20_000;

/// Queue depth above which the upload thread switches from
/// one-at-a-time processing to draining everything in one pass —
/// the original's `mUploadQueue.size() < 40` branch.
pub const HIGH_WATER_MARK: usize = 40;

/// A placeholder composed-mesh: real geometry is out of scope for
/// this core (§4.5), but this carries enough shape — a position list
/// and a triangle count — to exercise recentre/scale/simplify.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Vector3>,
    pub triangle_count: usize,
}

impl MeshData {
    pub fn new(positions: Vec<Vector3>, triangle_count: usize) -> Self {
        Self { positions, triangle_count }
    }

    /// A one-triangle stand-in for a leaf object's real mesh, sized to
    /// its bounding sphere.
    pub fn leaf(bounds: BoundingSphere) -> Self {
        let c = bounds.center;
        let positions = vec![
            c,
            c + Vector3::new(bounds.radius, 0.0, 0.0),
            c + Vector3::new(0.0, bounds.radius, 0.0),
        ];
        Self { positions, triangle_count: 1 }
    }
}

/// One node of the aggregation tree: an object with zero or more
/// children whose meshes compose into its own.
#[derive(Clone, Debug)]
pub struct AggregateNode {
    pub parent: Option<ObjectReference>,
    pub children: Vec<ObjectReference>,
    pub bounds: BoundingSphere,
    pub up_axis: UpAxis,
    pub mesh: Option<MeshData>,
}

impl AggregateNode {
    pub fn new() -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            bounds: BoundingSphere::new(Vector3::ZERO, 0.0),
            up_axis: UpAxis::Y,
            mesh: None,
        }
    }
}

impl Default for AggregateNode {
    fn default() -> Self {
        Self::new()
    }
}

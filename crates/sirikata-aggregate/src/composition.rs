//! The stub composition step (§4.5, §9): recentre each child mesh onto
//! the parent's bounding sphere, scale it to the ratio between the
//! parent's assigned bounds and its own, and simplify the concatenated
//! result down to [`TRIANGLE_BUDGET`] triangles. Axis correction is
//! recorded via each child's [`UpAxis`] but, since this core carries no
//! real mesh format, has nothing further to rotate.

use crate::types::{MeshData, TRIANGLE_BUDGET};
use sirikata_types::{BoundingSphere, Vector3};

/// Recentre and scale `mesh` (authored around `original_bounds`) so it
/// sits at `target_bounds` — the original's
/// `scalingfactor = scaledMeshBounds.radius() / (2 * originalMeshBounds.radius())`.
fn recentre_and_scale(mesh: &MeshData, original_bounds: BoundingSphere, target_bounds: BoundingSphere) -> MeshData {
    let scale = if original_bounds.radius > f32::EPSILON {
        target_bounds.radius / (2.0 * original_bounds.radius)
    } else {
        1.0
    };
    let positions = mesh
        .positions
        .iter()
        .map(|p| target_bounds.center + (*p - original_bounds.center) * scale)
        .collect();
    MeshData::new(positions, mesh.triangle_count)
}

/// Simplify a composed mesh down to `budget` triangles by uniformly
/// dropping vertices — a stand-in for a real mesh decimator, present
/// so the scheduling path has a bounded-cost step to exercise.
pub fn simplify_to_budget(mesh: MeshData, budget: usize) -> MeshData {
    if mesh.triangle_count <= budget {
        return mesh;
    }
    let keep_fraction = budget as f64 / mesh.triangle_count as f64;
    let keep = ((mesh.positions.len() as f64) * keep_fraction).ceil().max(3.0) as usize;
    let positions = mesh.positions.into_iter().take(keep).collect();
    MeshData::new(positions, budget)
}

/// The intrinsic bounding sphere of a mesh's own vertex positions —
/// the original's `originalMeshBoundingBox`, built by merging every
/// vertex before comparing it against the object's assigned
/// `mLoc->bounds(child_uuid)`.
fn intrinsic_bounds(positions: &[Vector3]) -> BoundingSphere {
    if positions.is_empty() {
        return BoundingSphere::new(Vector3::ZERO, 0.0);
    }
    let center = positions.iter().fold(Vector3::ZERO, |acc, p| acc + *p) * (1.0 / positions.len() as f32);
    let radius = positions.iter().map(|p| (*p - center).length()).fold(0.0f32, f32::max);
    BoundingSphere::new(center, radius)
}

/// Compose `children` (each with the world-space bounds it currently
/// occupies) into one mesh expressed relative to `parent_bounds`,
/// simplified to the default triangle budget. Each child is first
/// scaled from its own mesh's intrinsic size up to the world-space
/// bounds it was assigned, then recentred at its offset from
/// `parent_bounds` — the original's per-child `scalingfactor` step
/// followed by the instance transform.
pub fn compose(children: &[(MeshData, BoundingSphere)], parent_bounds: BoundingSphere) -> MeshData {
    let mut positions = Vec::new();
    let mut triangle_count = 0usize;

    for (mesh, child_bounds) in children {
        let original_bounds = intrinsic_bounds(&mesh.positions);
        let target_bounds = BoundingSphere::new(child_bounds.center - parent_bounds.center, child_bounds.radius);
        let placed = recentre_and_scale(mesh, original_bounds, target_bounds);
        positions.extend(placed.positions);
        triangle_count += mesh.triangle_count;
    }

    simplify_to_budget(MeshData::new(positions, triangle_count), TRIANGLE_BUDGET)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recentre_moves_onto_target_center() {
        let original = BoundingSphere::new(Vector3::new(10.0, 0.0, 0.0), 1.0);
        let target = BoundingSphere::new(Vector3::ZERO, 2.0);
        let mesh = MeshData::new(vec![original.center], 1);
        let placed = recentre_and_scale(&mesh, original, target);
        assert!((placed.positions[0] - target.center).length() < 1e-4);
    }

    #[test]
    fn simplify_below_budget_is_a_no_op() {
        let mesh = MeshData::new(vec![Vector3::ZERO; 3], 10);
        let out = simplify_to_budget(mesh.clone(), TRIANGLE_BUDGET);
        assert_eq!(out, mesh);
    }

    #[test]
    fn simplify_above_budget_caps_triangle_count() {
        let mesh = MeshData::new(vec![Vector3::ZERO; 100], 100_000);
        let out = simplify_to_budget(mesh, 10);
        assert_eq!(out.triangle_count, 10);
        assert!(out.positions.len() < 100);
    }

    #[test]
    fn compose_places_children_relative_to_parent() {
        let parent_bounds = BoundingSphere::new(Vector3::new(5.0, 0.0, 0.0), 4.0);
        let child_bounds = BoundingSphere::new(Vector3::new(6.0, 0.0, 0.0), 1.0);
        let child_mesh = MeshData::new(vec![child_bounds.center], 1);

        let composed = compose(&[(child_mesh, child_bounds)], parent_bounds);
        assert_eq!(composed.positions[0], Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(composed.triangle_count, 1);
    }
}

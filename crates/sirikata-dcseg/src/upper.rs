//! Upper-tree bootstrap (§4.1 "Topology"): every CSEG node holds the
//! entire upper tree, replicated and read-mostly. It is built once at
//! bootstrap by a deterministic depth-limited traversal so every node
//! computes the identical tree without needing to exchange it.

use crate::region::{NodeId, RegionTree};
use sirikata_types::{BoundingBox, CsegNodeId};

/// Build the upper tree for `world`, splitting every leaf down to
/// `cutoff_depth` (default 3, §4.1) and assigning leaf `i` (in
/// traversal order) to CSEG node `(i mod num_cseg_nodes) + 1`.
pub fn bootstrap(world: BoundingBox, cutoff_depth: u32, num_cseg_nodes: u32) -> RegionTree<CsegNodeId> {
    assert!(num_cseg_nodes > 0, "at least one CSEG node is required");
    let mut tree = RegionTree::single(world, CsegNodeId(1));
    let mut next_index: u32 = 0;
    split_to_depth(&mut tree, tree.root(), cutoff_depth, &mut next_index, num_cseg_nodes);
    tree
}

fn split_to_depth(
    tree: &mut RegionTree<CsegNodeId>,
    node: NodeId,
    remaining_depth: u32,
    next_index: &mut u32,
    num_cseg_nodes: u32,
) {
    if remaining_depth == 0 {
        let owner = assign(*next_index, num_cseg_nodes);
        *next_index += 1;
        set_owner(tree, node, owner);
        return;
    }
    let (low, high) = tree.split(node, CsegNodeId(1));
    split_to_depth(tree, low, remaining_depth - 1, next_index, num_cseg_nodes);
    split_to_depth(tree, high, remaining_depth - 1, next_index, num_cseg_nodes);
}

fn assign(index: u32, num_cseg_nodes: u32) -> CsegNodeId {
    CsegNodeId((index % num_cseg_nodes) + 1)
}

/// `RegionTree` has no in-place "relabel a leaf" op (owners are set at
/// split time); bootstrap needs one since the final assignment isn't
/// known until the recursive descent bottoms out. Implemented via a
/// trivial split-and-immediately-merge-back isn't available either, so
/// we re-derive it using a direct leaf rewrite through `split`'s
/// sibling machinery: simplest correct approach is to track owners in
/// a side table and apply them after descent completes.
fn set_owner(tree: &mut RegionTree<CsegNodeId>, node: NodeId, owner: CsegNodeId) {
    tree.relabel_leaf(node, owner);
}

#[cfg(test)]
mod tests {
    use super::*;
    use sirikata_types::Vector3;

    fn world() -> BoundingBox {
        BoundingBox::new(Vector3::new(-100.0, -100.0, -100.0), Vector3::new(100.0, 100.0, 100.0))
    }

    #[test]
    fn bootstrap_produces_two_to_the_depth_leaves() {
        let tree = bootstrap(world(), 2, 3);
        assert_eq!(tree.leaves().count(), 4);
    }

    #[test]
    fn bootstrap_round_robins_cseg_node_assignment() {
        let tree = bootstrap(world(), 2, 2);
        let owners: Vec<_> = tree.leaves().map(|id| tree.owner(id).unwrap()).collect();
        assert!(owners.contains(&CsegNodeId(1)));
        assert!(owners.contains(&CsegNodeId(2)));
    }

    #[test]
    fn leaves_partition_the_world() {
        let tree = bootstrap(world(), 3, 4);
        let mut union = None;
        for id in tree.leaves() {
            let bbox = tree.bbox(id);
            union = Some(match union {
                None => bbox,
                Some(u) => BoundingBox::union(&u, &bbox),
            });
        }
        assert_eq!(union.unwrap(), world());
    }
}

//! The segmented region tree (§3 "Segmented region tree", §9's
//! re-architecture note): an owned tagged-variant tree held in an
//! arena rather than a raw pointer graph. Generic over the leaf owner
//! type so the same structure serves both the upper tree
//! (`CsegNodeId` leaves) and a lower tree (`ServerId` leaves).

use sirikata_types::BoundingBox;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(usize);

#[derive(Clone, Debug)]
enum Node<Owner> {
    Leaf { bbox: BoundingBox, owner: Owner },
    Inner { bbox: BoundingBox, axis: usize, left: NodeId, right: NodeId },
}

/// An arena-held BSP tree. (I1) leaf boxes partition the root's box;
/// (I2) every owner present in the tree appears in at least one leaf.
#[derive(Clone, Debug)]
pub struct RegionTree<Owner> {
    nodes: Vec<Node<Owner>>,
    root: NodeId,
}

impl<Owner: Copy + PartialEq> RegionTree<Owner> {
    /// A single-leaf tree covering `world` and owned by `owner`.
    pub fn single(world: BoundingBox, owner: Owner) -> Self {
        Self { nodes: vec![Node::Leaf { bbox: world, owner }], root: NodeId(0) }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn bbox(&self, id: NodeId) -> BoundingBox {
        match &self.nodes[id.0] {
            Node::Leaf { bbox, .. } => *bbox,
            Node::Inner { bbox, .. } => *bbox,
        }
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0], Node::Leaf { .. })
    }

    pub fn owner(&self, id: NodeId) -> Option<Owner> {
        match &self.nodes[id.0] {
            Node::Leaf { owner, .. } => Some(*owner),
            Node::Inner { .. } => None,
        }
    }

    /// (Lookup algorithm step 2/3, §4.1.) Clamps `point` into the
    /// root box first, then descends by axis comparison until a leaf
    /// is reached.
    pub fn lookup(&self, point: sirikata_types::Vector3) -> NodeId {
        let clamped = self.bbox(self.root).clamp(point);
        let mut current = self.root;
        loop {
            match &self.nodes[current.0] {
                Node::Leaf { .. } => return current,
                Node::Inner { axis, left, right, .. } => {
                    let left_bbox = self.bbox(*left);
                    current = if clamped.component(*axis) <= left_bbox.max.component(*axis) {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// All current leaves, reached by descending from `root` rather
    /// than scanning the arena — `split`/`merge_with_sibling` append
    /// new nodes and collapse inner nodes into leaves in place, but
    /// never remove the nodes a merge collapses out of the tree, so a
    /// raw arena scan would also turn up those now-unreachable leaves.
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack = vec![self.root];
        let mut result = Vec::new();
        while let Some(id) = stack.pop() {
            match &self.nodes[id.0] {
                Node::Leaf { .. } => result.push(id),
                Node::Inner { left, right, .. } => {
                    stack.push(*right);
                    stack.push(*left);
                }
            }
        }
        result.into_iter()
    }

    /// Split the leaf at `id` along its long axis, assigning
    /// `new_owner` to the high half. Returns `(low, high)` node ids.
    /// Panics if `id` is not a leaf.
    pub fn split(&mut self, id: NodeId, new_owner: Owner) -> (NodeId, NodeId) {
        let (bbox, owner) = match self.nodes[id.0] {
            Node::Leaf { bbox, owner } => (bbox, owner),
            Node::Inner { .. } => panic!("split called on an inner node"),
        };
        let axis = bbox.long_axis();
        let (low_bbox, high_bbox) = bbox.split(axis);
        let low = NodeId(self.nodes.len());
        self.nodes.push(Node::Leaf { bbox: low_bbox, owner });
        let high = NodeId(self.nodes.len());
        self.nodes.push(Node::Leaf { bbox: high_bbox, owner: new_owner });
        self.nodes[id.0] = Node::Inner { bbox, axis, left: low, right: high };
        (low, high)
    }

    /// If `id`'s sibling (under its parent) is also a leaf, collapse
    /// the parent into a single leaf keeping `id`'s owner and
    /// returning the sibling's owner (to be returned to an
    /// availability pool by the caller). Returns `None` if `id` has
    /// no parent (it's the root) or the sibling isn't a leaf.
    pub fn merge_with_sibling(&mut self, id: NodeId) -> Option<Owner> {
        let parent = self.find_parent(id)?;
        let (parent_bbox, left, right) = match self.nodes[parent.0] {
            Node::Inner { bbox, left, right, .. } => (bbox, left, right),
            Node::Leaf { .. } => unreachable!("find_parent only returns inner nodes"),
        };
        let sibling = if left == id { right } else { left };
        let (keep_owner, removed_owner) = match (&self.nodes[id.0], &self.nodes[sibling.0]) {
            (Node::Leaf { owner: a, .. }, Node::Leaf { owner: b, .. }) => (*a, *b),
            _ => return None,
        };
        self.nodes[parent.0] = Node::Leaf { bbox: parent_bbox, owner: keep_owner };
        Some(removed_owner)
    }

    fn find_parent(&self, target: NodeId) -> Option<NodeId> {
        self.nodes.iter().enumerate().find_map(|(i, n)| match n {
            Node::Inner { left, right, .. } if *left == target || *right == target => Some(NodeId(i)),
            _ => None,
        })
    }

    /// Overwrite the owner of an existing leaf in place. Used only by
    /// bootstrap, where the final owner for a leaf isn't known until
    /// the recursive descent that creates it has finished. Panics if
    /// `id` is not a leaf.
    pub fn relabel_leaf(&mut self, id: NodeId, owner: Owner) {
        match &mut self.nodes[id.0] {
            Node::Leaf { owner: slot, .. } => *slot = owner,
            Node::Inner { .. } => panic!("relabel_leaf called on an inner node"),
        }
    }

    /// All leaf bounding boxes currently owned by `owner`.
    pub fn regions_for(&self, owner: Owner) -> Vec<BoundingBox> {
        self.leaves()
            .filter(|&id| self.owner(id) == Some(owner))
            .map(|id| self.bbox(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sirikata_types::Vector3;

    fn world() -> BoundingBox {
        BoundingBox::new(Vector3::new(-10.0, -10.0, -10.0), Vector3::new(10.0, 10.0, 10.0))
    }

    #[test]
    fn single_leaf_owns_every_point() {
        let tree = RegionTree::single(world(), 1u32);
        let leaf = tree.lookup(Vector3::new(3.0, -4.0, 0.0));
        assert_eq!(tree.owner(leaf), Some(1));
    }

    #[test]
    fn split_partitions_and_lookup_routes_correctly() {
        let mut tree = RegionTree::single(world(), 1u32);
        let (low, high) = tree.split(tree.root(), 2u32);
        assert_eq!(tree.owner(low), Some(1));
        assert_eq!(tree.owner(high), Some(2));

        let low_bbox = tree.bbox(low);
        let inside_low = low_bbox.center();
        let leaf = tree.lookup(inside_low);
        assert_eq!(leaf, low);
    }

    #[test]
    fn merge_restores_single_leaf_and_returns_removed_owner() {
        let mut tree = RegionTree::single(world(), 1u32);
        let (low, _high) = tree.split(tree.root(), 2u32);
        let removed = tree.merge_with_sibling(low);
        assert_eq!(removed, Some(2));
        assert_eq!(tree.leaves().count(), 1);
        assert_eq!(tree.owner(tree.root()), Some(1));
    }

    #[test]
    fn merge_on_root_is_noop() {
        let mut tree = RegionTree::single(world(), 1u32);
        assert_eq!(tree.merge_with_sibling(tree.root()), None);
    }

    #[test]
    fn merge_then_split_does_not_resurrect_orphaned_leaves() {
        let mut tree = RegionTree::single(world(), 1u32);
        let (low, _high) = tree.split(tree.root(), 2u32);
        tree.merge_with_sibling(low);
        let (low, _high) = tree.split(tree.root(), 3u32);
        tree.merge_with_sibling(low);

        assert_eq!(tree.leaves().count(), 1);
        assert_eq!(tree.regions_for(2u32).len(), 0);
        assert_eq!(tree.regions_for(3u32).len(), 0);
    }

    #[test]
    fn regions_for_owner_after_split() {
        let mut tree = RegionTree::single(world(), 1u32);
        tree.split(tree.root(), 2u32);
        assert_eq!(tree.regions_for(1u32).len(), 1);
        assert_eq!(tree.regions_for(2u32).len(), 1);
        assert_eq!(tree.regions_for(3u32).len(), 0);
    }
}

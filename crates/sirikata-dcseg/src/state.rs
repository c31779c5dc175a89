//! `CsegNodeState`: the segmentation tree data itself (§5 "the
//! segmentation tree is mutated only on the `cseg-net` strand"). This
//! type owns no channels or sockets — it is the pure data + algorithm
//! layer, driven exclusively by the `cseg-net` task built in `actor.rs`.

use crate::hash::{bbox_hash, BboxHash};
use crate::pool::ServerIdPool;
use crate::region::RegionTree;
use rand::Rng;
use sirikata_messaging::cseg_wire::{SegmentationChangeEntry, SegmentationChangeMessage};
use sirikata_types::{BoundingBox, CsegNodeId, ServerId, Vector3};
use std::collections::HashMap;
use std::net::SocketAddr;

/// Either an answer this node could compute locally, or a pointer to
/// who can (§4.1 lookup steps 3-4).
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Local(ServerId),
    Remote { node: CsegNodeId, bbox: BoundingBox },
}

/// Tuning knobs exposed on the CLI (§6) and defaulted per §4.1/§9.
#[derive(Clone, Debug)]
pub struct DcsegConfig {
    pub maintenance_interval_secs: u64,
    pub upper_tree_cutoff_depth: u32,
    /// §9 open question: the source effectively disabled merges via a
    /// dead `&& false`. Both paths are reimplemented and gated by this
    /// toggle instead of silently disabling one of them.
    pub merges_enabled: bool,
    pub splits_enabled: bool,
}

impl Default for DcsegConfig {
    fn default() -> Self {
        Self {
            maintenance_interval_secs: 15,
            upper_tree_cutoff_depth: 3,
            merges_enabled: true,
            splits_enabled: true,
        }
    }
}

pub struct CsegNodeState {
    pub local_id: CsegNodeId,
    config: DcsegConfig,
    upper: RegionTree<CsegNodeId>,
    /// `mLowerLevelTrees`: only the lower trees this node is
    /// responsible for, keyed by I3's bbox hash.
    lower_trees: HashMap<BboxHash, RegionTree<ServerId>>,
    pool: ServerIdPool,
    /// `mWholeTreeServerRegionMap`: a read-mostly cache of other
    /// servers' regions, populated from `SegmentationChangeMessage`s;
    /// invalidated (by removal) whenever a fresher entry for that
    /// server arrives.
    server_region_cache: HashMap<ServerId, Vec<BoundingBox>>,
    /// Peer CSEG nodes this node knows how to reach, for the remote
    /// lookup path (§4.1 step 4) and for forwarding segmentation
    /// changes.
    peers: HashMap<CsegNodeId, SocketAddr>,
    /// Space servers that sent `SEGMENTATION_LISTEN` and should
    /// receive future `SegmentationChangeMessage` pushes.
    listeners: Vec<SocketAddr>,
}

impl CsegNodeState {
    pub fn new(
        local_id: CsegNodeId,
        config: DcsegConfig,
        upper: RegionTree<CsegNodeId>,
        mut pool: ServerIdPool,
    ) -> Self {
        let mut lower_trees = HashMap::new();
        let local_leaves: Vec<_> = upper.leaves().filter(|&leaf| upper.owner(leaf) == Some(local_id)).collect();
        for leaf in local_leaves {
            let bbox = upper.bbox(leaf);
            // Bootstrap each locally owned upper-tree leaf with a
            // single-leaf lower tree assigned from the pool.
            if let Some(server) = pool.take() {
                lower_trees.insert(bbox_hash(&bbox), RegionTree::single(bbox, server));
            }
        }
        Self {
            local_id,
            config,
            upper,
            lower_trees,
            pool,
            server_region_cache: HashMap::new(),
            peers: HashMap::new(),
            listeners: Vec::new(),
        }
    }

    pub fn register_peer(&mut self, node: CsegNodeId, addr: SocketAddr) {
        self.peers.insert(node, addr);
    }

    pub fn peer_addr(&self, node: CsegNodeId) -> Option<SocketAddr> {
        self.peers.get(&node).copied()
    }

    pub fn peer_addrs(&self) -> impl Iterator<Item = SocketAddr> + '_ {
        self.peers.values().copied()
    }

    pub fn register_listener(&mut self, addr: SocketAddr) {
        if !self.listeners.contains(&addr) {
            self.listeners.push(addr);
        }
    }

    pub fn listener_addrs(&self) -> impl Iterator<Item = SocketAddr> + '_ {
        self.listeners.iter().copied()
    }

    /// §4.1 LL_LOOKUP_REQUEST handling: the sender already resolved
    /// the owning upper-tree leaf to this node, so we go straight to
    /// the named lower tree rather than re-descending the upper tree.
    pub fn lookup_in_lower(&self, bbox_hint: BoundingBox, point: Vector3) -> Option<ServerId> {
        let tree = self.lower_trees.get(&bbox_hash(&bbox_hint))?;
        let leaf = tree.lookup(point);
        tree.owner(leaf)
    }

    pub fn config(&self) -> &DcsegConfig {
        &self.config
    }

    pub fn region(&self) -> BoundingBox {
        self.upper.bbox(self.upper.root())
    }

    /// (Lookup algorithm, §4.1.) Clamping happens inside
    /// `RegionTree::lookup` on both the upper and lower descents.
    pub fn lookup(&self, point: Vector3) -> LookupOutcome {
        let upper_leaf = self.upper.lookup(point);
        let node = self.upper.owner(upper_leaf).expect("upper tree leaves always have an owner");
        let bbox = self.upper.bbox(upper_leaf);
        if node != self.local_id {
            return LookupOutcome::Remote { node, bbox };
        }
        match self.lower_trees.get(&bbox_hash(&bbox)) {
            Some(lower) => {
                let leaf = lower.lookup(point);
                LookupOutcome::Local(lower.owner(leaf).expect("lower tree leaves always have an owner"))
            }
            // A local upper leaf with no hosted lower tree is a
            // bootstrap/ownership-transfer inconsistency; surface it
            // as the wire-level "unknown" sentinel rather than
            // panicking, per §4.1's failure semantics.
            None => LookupOutcome::Local(ServerId::ANY),
        }
    }

    /// §9 open question on `numServers()`: this implementation counts
    /// currently-active (assigned-to-a-leaf) servers across all
    /// locally hosted lower trees, not the size of the configured
    /// availability pool — "active" is the more useful answer for a
    /// caller asking "how many servers are serving traffic right now."
    pub fn num_servers(&self) -> u32 {
        let mut seen = std::collections::HashSet::new();
        for tree in self.lower_trees.values() {
            for leaf in tree.leaves() {
                if let Some(owner) = tree.owner(leaf) {
                    seen.insert(owner);
                }
            }
        }
        seen.len() as u32
    }

    /// All leaf boxes owned by `server`, searching only locally
    /// hosted lower trees first and falling back to the remote-view
    /// cache (§4.1 `serverRegion`).
    pub fn server_region(&self, server: ServerId) -> Vec<BoundingBox> {
        let local: Vec<BoundingBox> =
            self.lower_trees.values().flat_map(|t| t.regions_for(server)).collect();
        if !local.is_empty() {
            return local;
        }
        self.server_region_cache.get(&server).cloned().unwrap_or_default()
    }

    /// One maintenance pass (§4.1 "Split/merge"): pick a random local
    /// lower tree and a random leaf in it; attempt a merge if eligible
    /// and enabled, otherwise a split if enabled. Returns the resulting
    /// `SegmentationChangeMessage` to broadcast, if anything changed.
    pub fn maintenance_step(&mut self, rng: &mut impl Rng) -> Option<SegmentationChangeMessage> {
        if self.lower_trees.is_empty() {
            return None;
        }
        let hashes: Vec<BboxHash> = self.lower_trees.keys().copied().collect();
        let hash = hashes[rng.gen_range(0..hashes.len())];
        let tree = self.lower_trees.get_mut(&hash)?;
        let leaves: Vec<_> = tree.leaves().collect();
        if leaves.is_empty() {
            return None;
        }
        let leaf = leaves[rng.gen_range(0..leaves.len())];

        if self.config.merges_enabled && rng.gen_bool(0.5) {
            if let Some(freed) = tree.merge_with_sibling(leaf) {
                self.pool.release(freed);
                let changed_server = tree.owner(leaf)?;
                return Some(self.change_message_for(changed_server, &hash));
            }
        }
        if self.config.splits_enabled {
            if let Some(new_server) = self.pool.take() {
                let old_owner = tree.owner(leaf);
                tree.split(leaf, new_server);
                let mut msg_entries = Vec::new();
                if let Some(old_owner) = old_owner {
                    msg_entries.push(self.entry_for(old_owner, &hash));
                }
                msg_entries.push(self.entry_for(new_server, &hash));
                return Some(SegmentationChangeMessage { entries: msg_entries });
            }
        }
        None
    }

    fn change_message_for(&self, server: ServerId, hash: &BboxHash) -> SegmentationChangeMessage {
        SegmentationChangeMessage { entries: vec![self.entry_for(server, hash)] }
    }

    fn entry_for(&self, server: ServerId, hash: &BboxHash) -> SegmentationChangeEntry {
        let regions = self.lower_trees.get(hash).map(|t| t.regions_for(server)).unwrap_or_default();
        SegmentationChangeEntry { server, regions }
    }

    /// Apply an inbound `SegmentationChangeMessage` from a peer CSEG
    /// node: invalidate (replace) the cached view for every named
    /// server. Does not mutate any locally hosted lower tree — those
    /// are only ever mutated by this node's own `maintenance_step`.
    pub fn apply_segmentation_change(&mut self, msg: &SegmentationChangeMessage) {
        for entry in &msg.entries {
            if entry.regions.is_empty() {
                self.server_region_cache.remove(&entry.server);
            } else {
                self.server_region_cache.insert(entry.server, entry.regions.clone());
            }
        }
    }

    pub fn upper_tree(&self) -> &RegionTree<CsegNodeId> {
        &self.upper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upper::bootstrap;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn world() -> BoundingBox {
        BoundingBox::new(Vector3::new(-100.0, -100.0, -100.0), Vector3::new(100.0, 100.0, 100.0))
    }

    fn single_node_state() -> CsegNodeState {
        let upper = bootstrap(world(), 1, 1);
        let pool = ServerIdPool::new((2..20).map(|v| ServerId::assigned(v).unwrap()));
        CsegNodeState::new(CsegNodeId(1), DcsegConfig::default(), upper, pool)
    }

    #[test]
    fn lookup_resolves_locally_on_single_node() {
        let state = single_node_state();
        let outcome = state.lookup(Vector3::new(3.0, 3.0, 3.0));
        assert!(matches!(outcome, LookupOutcome::Local(_)));
    }

    #[test]
    fn split_then_lookup_reflects_new_partition() {
        let mut state = single_node_state();
        let mut rng = StdRng::seed_from_u64(42);
        let msg = state.maintenance_step(&mut rng);
        assert!(msg.is_some());
        assert!(state.num_servers() >= 1);
    }

    #[test]
    fn apply_segmentation_change_updates_cache_for_remote_server() {
        let mut state = single_node_state();
        let server = ServerId::assigned(99).unwrap();
        let bbox = BoundingBox::new(Vector3::ZERO, Vector3::new(1.0, 1.0, 1.0));
        let msg = SegmentationChangeMessage {
            entries: vec![SegmentationChangeEntry { server, regions: vec![bbox] }],
        };
        state.apply_segmentation_change(&msg);
        assert_eq!(state.server_region(server), vec![bbox]);
    }
}

//! Distributed Coordinate Segmentation (§4.1): a two-tier BSP-tree
//! fleet that maps 3D positions to authoritative space `ServerId`s and
//! propagates live split/merge changes to every attached space server.

mod actor;
pub mod error;
mod hash;
mod net;
mod pool;
mod region;
mod server;
mod state;
mod upper;

pub use actor::{remote_lookup_entry, remote_server_region, CsegNodeHandle};
pub use error::Error;
pub use hash::{bbox_hash, BboxHash};
pub use pool::ServerIdPool;
pub use region::{NodeId, RegionTree};
pub use server::serve;
pub use state::{CsegNodeState, DcsegConfig, LookupOutcome};
pub use upper::bootstrap as bootstrap_upper_tree;

/// Construct and spawn a fully wired CSEG node: builds the upper tree,
/// bootstraps local lower trees from `pool`, and starts the
/// `cseg-net` task. Returns a handle for issuing commands and the
/// task's join handle for shutdown.
pub fn spawn_node(
    local_id: sirikata_types::CsegNodeId,
    world: sirikata_types::BoundingBox,
    config: DcsegConfig,
    num_cseg_nodes: u32,
    pool: ServerIdPool,
) -> (CsegNodeHandle, tokio::task::JoinHandle<()>) {
    let upper = upper::bootstrap(world, config.upper_tree_cutoff_depth, num_cseg_nodes);
    let state = CsegNodeState::new(local_id, config, upper, pool);
    actor::spawn(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sirikata_types::{CsegNodeId, ServerId, Vector3};
    use tokio::time::{sleep, Duration};

    fn world() -> sirikata_types::BoundingBox {
        sirikata_types::BoundingBox::new(Vector3::new(-50.0, -50.0, -50.0), Vector3::new(50.0, 50.0, 50.0))
    }

    #[tokio::test]
    async fn single_node_lookup_resolves_to_a_server() {
        let pool = ServerIdPool::new((2..50).map(|v| ServerId::assigned(v).unwrap()));
        let (handle, _join) =
            spawn_node(CsegNodeId(1), world(), DcsegConfig::default(), 1, pool);
        let server = handle.lookup(Vector3::new(1.0, 1.0, 1.0)).await;
        assert!(!server.is_any());
    }

    #[tokio::test]
    async fn out_of_range_point_clamps_into_world() {
        let pool = ServerIdPool::new((2..50).map(|v| ServerId::assigned(v).unwrap()));
        let (handle, _join) =
            spawn_node(CsegNodeId(1), world(), DcsegConfig::default(), 1, pool);
        let server = handle.lookup(Vector3::new(10_000.0, -10_000.0, 0.0)).await;
        assert!(!server.is_any());
    }

    #[tokio::test]
    async fn repeated_lookup_of_the_same_point_is_stable() {
        // P1 (§8): lookup against an unchanged tree is deterministic.
        let pool = ServerIdPool::new((2..50).map(|v| ServerId::assigned(v).unwrap()));
        let (handle, _join) = spawn_node(CsegNodeId(1), world(), DcsegConfig::default(), 1, pool);
        let point = Vector3::new(-12.0, 7.0, 3.0);
        let first = handle.lookup(point).await;
        sleep(Duration::from_millis(5)).await;
        let second = handle.lookup(point).await;
        assert_eq!(first, second);
    }
}

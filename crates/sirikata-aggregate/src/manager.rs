//! The Aggregate Manager (§4.5): a tree of composed meshes, rebuilt
//! and re-uploaded as children change, via a dedicated worker thread
//! guarded by a condition variable rather than the `tokio`-task
//! strands used elsewhere in this core — mirroring the original's
//! `uploadQueueServiceThread` directly (§9), since this is scheduling
//! CPU-bound mesh work and filesystem/network upload, not async I/O.

use crate::composition::{compose, simplify_to_budget};
use crate::types::{AggregateNode, MeshData, HIGH_WATER_MARK, TRIANGLE_BUDGET};
use crate::uploader::MeshUploader;
use dashmap::DashMap;
use sirikata_types::{BoundingSphere, ObjectReference};
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Notified when a remote URI becomes available for an aggregate's
/// composed mesh — the original's `mLoc->updateLocalAggregateMesh`.
pub trait AggregateLocUpdater: Send + Sync {
    fn update_local_aggregate_mesh(&self, object: ObjectReference, remote_uri: String);
}

struct UploadQueue {
    pending: Mutex<HashMap<ObjectReference, MeshData>>,
    condvar: Condvar,
    running: Mutex<bool>,
}

pub struct AggregateManager {
    nodes: DashMap<ObjectReference, AggregateNode>,
    queue: Arc<UploadQueue>,
    worker: Option<JoinHandle<()>>,
}

impl AggregateManager {
    pub fn new(uploader: Arc<dyn MeshUploader>, loc: Arc<dyn AggregateLocUpdater>) -> Self {
        let queue = Arc::new(UploadQueue {
            pending: Mutex::new(HashMap::new()),
            condvar: Condvar::new(),
            running: Mutex::new(true),
        });
        let worker_queue = queue.clone();
        let worker = std::thread::spawn(move || upload_queue_service_thread(worker_queue, uploader, loc));
        Self { nodes: DashMap::new(), queue, worker: Some(worker) }
    }

    pub fn add_aggregate(&self, object: ObjectReference) {
        self.nodes.entry(object).or_insert_with(AggregateNode::new);
    }

    pub fn remove_aggregate(&self, object: ObjectReference) {
        self.nodes.remove(&object);
    }

    /// §9: "aggregateChildAdded" — schedules a mesh rebuild for `object`.
    pub fn add_child(&self, object: ObjectReference, child: ObjectReference) {
        {
            let mut node = self.nodes.entry(object).or_insert_with(AggregateNode::new);
            if !node.children.contains(&child) {
                node.children.push(child);
            }
        }
        self.nodes.entry(child).or_insert_with(AggregateNode::new).parent = Some(object);
        self.touch(object);
    }

    /// §9: "aggregateChildRemoved".
    pub fn remove_child(&self, object: ObjectReference, child: ObjectReference) {
        if let Some(mut node) = self.nodes.get_mut(&object) {
            node.children.retain(|c| *c != child);
        }
        self.touch(object);
    }

    /// §9: "aggregateBoundsUpdated".
    pub fn aggregate_bounds_updated(&self, object: ObjectReference, bounds: BoundingSphere) {
        self.nodes.entry(object).or_insert_with(AggregateNode::new).bounds = bounds;
        self.touch(object);
    }

    /// Recomposes `object`'s own mesh, then bubbles the same
    /// recomposition up to its parent — a change to a leaf's bounds or
    /// mesh invalidates every ancestor's composed mesh in turn, the
    /// original's `generateAggregateMesh(aggObject->mParentUUID, ...)`.
    fn touch(&self, object: ObjectReference) {
        self.generate_aggregate_mesh(object);
        if let Some(parent) = self.nodes.get(&object).and_then(|n| n.parent) {
            self.touch(parent);
        }
    }

    /// §9: "aggregateDestroyed".
    pub fn aggregate_destroyed(&self, object: ObjectReference) {
        self.remove_aggregate(object);
    }

    /// Recomposes `object`'s mesh from its children's current meshes
    /// and enqueues it for upload — the original's
    /// `generateAggregateMesh`/`generateAggregateMeshAsync`.
    fn generate_aggregate_mesh(&self, object: ObjectReference) {
        let Some(node) = self.nodes.get(&object) else { return };
        let parent_bounds = node.bounds;
        let children: Vec<(MeshData, BoundingSphere)> = node
            .children
            .iter()
            .filter_map(|child| self.nodes.get(child).map(|c| (c.mesh.clone().unwrap_or_else(|| MeshData::leaf(c.bounds)), c.bounds)))
            .collect();
        drop(node);

        if children.is_empty() {
            return;
        }

        let composed = compose(&children, parent_bounds);
        let composed = simplify_to_budget(composed, TRIANGLE_BUDGET);

        if let Some(mut node) = self.nodes.get_mut(&object) {
            node.mesh = Some(composed.clone());
        }

        self.enqueue_mesh(object, composed);
    }

    /// The original's `uploadMesh`: stores the mesh and wakes the
    /// worker thread.
    fn enqueue_mesh(&self, object: ObjectReference, mesh: MeshData) {
        let mut pending = self.queue.pending.lock().unwrap();
        pending.insert(object, mesh);
        debug!(?object, pending = pending.len(), "enqueued aggregate mesh for upload");
        self.queue.condvar.notify_one();
    }
}

impl Drop for AggregateManager {
    fn drop(&mut self) {
        *self.queue.running.lock().unwrap() = false;
        self.queue.condvar.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn upload_queue_service_thread(queue: Arc<UploadQueue>, uploader: Arc<dyn MeshUploader>, loc: Arc<dyn AggregateLocUpdater>) {
    loop {
        let batch = {
            let mut pending = queue.pending.lock().unwrap();
            while pending.is_empty() {
                if !*queue.running.lock().unwrap() {
                    return;
                }
                pending = queue.condvar.wait(pending).unwrap();
            }

            if !*queue.running.lock().unwrap() && pending.is_empty() {
                return;
            }

            if pending.len() < HIGH_WATER_MARK {
                let key = *pending.keys().next().unwrap();
                let mesh = pending.remove(&key).unwrap();
                vec![(key, mesh)]
            } else {
                pending.drain().collect()
            }
        };

        for (object, mesh) in batch {
            upload_one(object, mesh, uploader.as_ref(), loc.as_ref());
        }
    }
}

fn upload_one(object: ObjectReference, mesh: MeshData, uploader: &dyn MeshUploader, loc: &dyn AggregateLocUpdater) {
    let local_path = std::path::PathBuf::from(format!("aggregate_mesh_{object}.dae"));
    match uploader.put(&local_path) {
        Ok(remote_uri) => loc.update_local_aggregate_mesh(object, remote_uri),
        Err(error) => warn!(?object, %error, "aggregate mesh upload failed"),
    }
    let _ = mesh.triangle_count;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uploader::NullMeshUploader;
    use sirikata_types::Vector3;
    use std::sync::mpsc;

    struct RecordingLoc {
        tx: Mutex<mpsc::Sender<(ObjectReference, String)>>,
    }

    impl AggregateLocUpdater for RecordingLoc {
        fn update_local_aggregate_mesh(&self, object: ObjectReference, remote_uri: String) {
            let _ = self.tx.lock().unwrap().send((object, remote_uri));
        }
    }

    #[test]
    fn add_child_eventually_uploads_composed_mesh() {
        let (tx, rx) = mpsc::channel();
        let manager = AggregateManager::new(Arc::new(NullMeshUploader), Arc::new(RecordingLoc { tx: Mutex::new(tx) }));

        let parent = ObjectReference::random();
        let child = ObjectReference::random();
        manager.add_aggregate(parent);
        manager.aggregate_bounds_updated(parent, BoundingSphere::new(Vector3::ZERO, 10.0));
        manager.add_child(parent, child);
        manager.aggregate_bounds_updated(child, BoundingSphere::new(Vector3::new(1.0, 0.0, 0.0), 1.0));

        let (object, uri) = rx.recv_timeout(std::time::Duration::from_secs(2)).expect("upload did not complete in time");
        assert_eq!(object, parent);
        assert!(uri.starts_with("meerkat://"));
    }

    #[test]
    fn remove_aggregate_drops_its_node() {
        let manager = AggregateManager::new(Arc::new(NullMeshUploader), Arc::new(RecordingLoc { tx: Mutex::new(mpsc::channel().0) }));
        let object = ObjectReference::random();
        manager.add_aggregate(object);
        manager.remove_aggregate(object);
        assert!(manager.nodes.get(&object).is_none());
    }
}

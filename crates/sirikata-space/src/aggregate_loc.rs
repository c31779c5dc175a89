//! Bridges the Aggregate Manager's upload notifications (§4.5) back
//! into the Location Service Cache's `mesh` field, standing in for the
//! original's `LocationService::updateLocalAggregateMesh`.

use sirikata_loc::InMemoryLocationServiceCache;
use sirikata_types::{ObjectReference, SpaceId, SpaceObjectReference};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct LscAggregateLocUpdater {
    cache: Arc<InMemoryLocationServiceCache>,
    space: SpaceId,
    next_seqno: AtomicU64,
}

impl LscAggregateLocUpdater {
    pub fn new(cache: Arc<InMemoryLocationServiceCache>, space: SpaceId) -> Self {
        Self { cache, space, next_seqno: AtomicU64::new(1) }
    }
}

impl sirikata_aggregate::AggregateLocUpdater for LscAggregateLocUpdater {
    fn update_local_aggregate_mesh(&self, object: ObjectReference, remote_uri: String) {
        let sporef = SpaceObjectReference::new(self.space, object);
        let seqno = self.next_seqno.fetch_add(1, Ordering::Relaxed);
        self.cache.update_mesh(sporef, seqno, Some(remote_uri));
    }
}

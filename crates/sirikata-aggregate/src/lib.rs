//! Aggregate Manager (§4.5): unchanged from the original design —
//! composes a tree of objects' meshes bottom-up and uploads the
//! result through a pluggable [`MeshUploader`], on a dedicated worker
//! thread rather than the `tokio` strands used elsewhere in this core.

mod composition;
mod error;
mod manager;
mod types;
mod uploader;

pub use composition::{compose, simplify_to_budget};
pub use error::{Error, Result};
pub use manager::{AggregateLocUpdater, AggregateManager};
pub use types::{AggregateNode, MeshData, HIGH_WATER_MARK, TRIANGLE_BUDGET};
pub use uploader::{MeshUploader, NullMeshUploader};

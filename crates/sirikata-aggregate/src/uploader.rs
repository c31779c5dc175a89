//! §4.5, §9: "configurable `MeshUploader` instead of a shelled
//! `system()` call" — the original's `uploadQueueServiceThread` shells
//! out to `upload_to_cdn.sh`; this core replaces that with a trait so
//! a real CDN client can be substituted without touching the
//! scheduling code.

use crate::error::Result;
use std::path::Path;

pub trait MeshUploader: Send + Sync {
    /// Upload the composed mesh at `local_path` and return the URI
    /// objects should reference it by.
    fn put(&self, local_path: &Path) -> Result<String>;
}

/// Assigns a URI without touching the filesystem or network —
/// sufficient to exercise queueing and backpressure without depending
/// on a real mesh format or CDN.
pub struct NullMeshUploader;

impl MeshUploader for NullMeshUploader {
    fn put(&self, local_path: &Path) -> Result<String> {
        Ok(format!("meerkat:///aggregates/{}", local_path.display()))
    }
}

//! # Manifest Store
//!
//! The append-only version history per logical file path. The core consumes
//! manifests only through the narrow [`ManifestPersistence`] contract; the
//! encoding behind it is an adapter detail (in-memory for tests, a JSON
//! file for the daemon).
//!
//! [`ManifestStore`] wraps an adapter with the argument validation every
//! caller relies on.

pub mod json_file;

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use shared_types::FileManifest;

pub use json_file::JsonFileManifestStore;

/// Errors from the manifest store and its adapters.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// No universal naming path was given.
    #[error("manifest has no path")]
    InvalidPath,

    /// The manifest identifier is the reserved nil value.
    #[error("manifest identifier is nil")]
    NilIdentifier,

    /// The backing file failed underneath the adapter.
    #[error("manifest persistence I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted form could not be encoded or decoded.
    #[error("manifest encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The persistence collaborator contract.
///
/// `put` is insert-or-replace keyed by manifest id or path — a manifest
/// arriving with a known path but a new id supersedes the old history.
pub trait ManifestPersistence: Send + Sync {
    fn get_by_path(&self, path: &str) -> Result<Option<FileManifest>, ManifestError>;
    fn get_by_id(&self, id: Uuid) -> Result<Option<FileManifest>, ManifestError>;
    fn put(&self, manifest: FileManifest) -> Result<(), ManifestError>;
    fn read_all(&self) -> Result<Vec<FileManifest>, ManifestError>;
}

/// Validating front over a persistence adapter. Owns the canonical manifest
/// list; nothing above this layer caches manifests independently.
pub struct ManifestStore {
    persistence: Arc<dyn ManifestPersistence>,
}

impl ManifestStore {
    pub fn new(persistence: Arc<dyn ManifestPersistence>) -> Self {
        Self { persistence }
    }

    /// Look a manifest up by path. `None` when the path has no history.
    pub fn get_by_path(&self, path: &str) -> Result<Option<FileManifest>, ManifestError> {
        if path.is_empty() {
            return Err(ManifestError::InvalidPath);
        }
        self.persistence.get_by_path(path)
    }

    /// Look a manifest up by id.
    pub fn get_by_id(&self, id: Uuid) -> Result<Option<FileManifest>, ManifestError> {
        if id.is_nil() {
            return Err(ManifestError::NilIdentifier);
        }
        self.persistence.get_by_id(id)
    }

    /// Insert or replace a manifest.
    pub fn put(&self, manifest: FileManifest) -> Result<(), ManifestError> {
        if manifest.path.is_empty() {
            return Err(ManifestError::InvalidPath);
        }
        if manifest.id.is_nil() {
            return Err(ManifestError::NilIdentifier);
        }
        debug!(path = %manifest.path, id = %manifest.id, versions = manifest.versions.len(), "[manifest] put");
        self.persistence.put(manifest)
    }

    /// Every known manifest.
    pub fn read_all(&self) -> Result<Vec<FileManifest>, ManifestError> {
        self.persistence.read_all()
    }
}

/// In-memory adapter for tests and single-process embedding.
#[derive(Default)]
pub struct InMemoryManifestStore {
    by_id: RwLock<HashMap<Uuid, FileManifest>>,
}

impl InMemoryManifestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ManifestPersistence for InMemoryManifestStore {
    fn get_by_path(&self, path: &str) -> Result<Option<FileManifest>, ManifestError> {
        Ok(self
            .by_id
            .read()
            .values()
            .find(|m| m.path == path)
            .cloned())
    }

    fn get_by_id(&self, id: Uuid) -> Result<Option<FileManifest>, ManifestError> {
        Ok(self.by_id.read().get(&id).cloned())
    }

    fn put(&self, manifest: FileManifest) -> Result<(), ManifestError> {
        let mut by_id = self.by_id.write();
        // Replace any older history for the same path carried under a
        // different id.
        by_id.retain(|&id, m| id == manifest.id || m.path != manifest.path);
        by_id.insert(manifest.id, manifest);
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<FileManifest>, ManifestError> {
        Ok(self.by_id.read().values().cloned().collect())
    }
}

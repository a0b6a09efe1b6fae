//! # JSON File Adapter
//!
//! Durable manifest persistence for the daemon: the whole manifest list as
//! one JSON document, rewritten atomically (temp file + rename) on every
//! put. Manifest counts are small — a node holds one entry per logical
//! path — so whole-file rewrites stay cheap.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use uuid::Uuid;

use shared_types::FileManifest;

use super::{ManifestError, ManifestPersistence};

/// File-backed manifest persistence.
pub struct JsonFileManifestStore {
    path: PathBuf,
    by_id: RwLock<HashMap<Uuid, FileManifest>>,
}

impl JsonFileManifestStore {
    /// Open the store, loading any existing manifest list.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref().to_path_buf();
        let by_id = match Self::load(&path)? {
            Some(manifests) => {
                info!(path = %path.display(), count = manifests.len(), "[manifest] loaded manifest file");
                manifests.into_iter().map(|m| (m.id, m)).collect()
            }
            None => {
                info!(path = %path.display(), "[manifest] no manifest file yet");
                HashMap::new()
            }
        };
        Ok(Self {
            path,
            by_id: RwLock::new(by_id),
        })
    }

    fn load(path: &Path) -> Result<Option<Vec<FileManifest>>, ManifestError> {
        match fs::read(path) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Rewrite the manifest list atomically via temp file + rename.
    fn persist(&self, by_id: &HashMap<Uuid, FileManifest>) -> Result<(), ManifestError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let manifests: Vec<&FileManifest> = by_id.values().collect();
        let bytes = serde_json::to_vec_pretty(&manifests)?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl ManifestPersistence for JsonFileManifestStore {
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
        by_id.retain(|&id, m| id == manifest.id || m.path != manifest.path);
        by_id.insert(manifest.id, manifest);
        if let Err(e) = self.persist(&by_id) {
            warn!(path = %self.path.display(), error = %e, "[manifest] persist failed");
            return Err(e);
        }
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<FileManifest>, ManifestError> {
        Ok(self.by_id.read().values().cloned().collect())
    }
}

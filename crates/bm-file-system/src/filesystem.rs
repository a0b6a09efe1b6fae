//! # File System Orchestrator
//!
//! Whole-file store/retrieve over the manifest store and the storage
//! manager.
//!
//! ## Store
//!
//! ```text
//! store(path, payload)
//!   ├─ split payload into blocks           (codec)
//!   ├─ push a new version onto the path's manifest, persist it
//!   ├─ save every block to all local tiers (storage manager)
//!   └─ emit ManifestUpdated               (peer layer pushes to peers)
//! ```
//!
//! Retrieval reverses this: manifest lookup, newest version, per-block
//! fetch (local first, remote fallback), reassembly, trim.
//!
//! Remote repair is invisible here — callers only ever see malformed-input
//! errors or genuine local-store failures.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use bm_block_store::{Scope, StorageManager};
use shared_types::{BlockId, FileManifest, VersionManifest};

use crate::cache::FileCache;
use crate::errors::FsError;
use crate::manifest::ManifestStore;

/// Buffered manifest-update events before a slow subscriber starts losing
/// the oldest ones.
const MANIFEST_EVENT_CAPACITY: usize = 64;

/// Public interface to storing data.
pub struct FileSystem {
    manager: Arc<StorageManager>,
    manifests: Arc<ManifestStore>,
    cache: FileCache,
    manifest_updates: broadcast::Sender<FileManifest>,
    max_file_bytes: u64,
}

impl FileSystem {
    pub fn new(manager: Arc<StorageManager>, manifests: Arc<ManifestStore>, max_file_bytes: u64) -> Self {
        let (manifest_updates, _) = broadcast::channel(MANIFEST_EVENT_CAPACITY);
        Self {
            manager,
            manifests,
            cache: FileCache::new(),
            manifest_updates,
            max_file_bytes,
        }
    }

    /// Store `payload` as a new version of `path`.
    ///
    /// The manifest is persisted before the blocks are written; a crash in
    /// between leaves a version whose blocks the synchronizer will repair
    /// from peers.
    pub fn store(&self, path: &str, payload: &[u8]) -> Result<FileManifest, FsError> {
        if path.is_empty() {
            return Err(FsError::InvalidPath);
        }
        if payload.is_empty() {
            return Err(FsError::EmptyPayload);
        }
        if payload.len() as u64 > self.max_file_bytes {
            return Err(FsError::FileTooLarge {
                len: payload.len() as u64,
                max: self.max_file_bytes,
            });
        }

        let mut blocks = self.manager.codec().split(payload)?;
        for block in &mut blocks {
            block.compute_hash();
        }
        let version = VersionManifest::new(
            payload.len() as u64,
            blocks.iter().map(|b| b.id).collect(),
        );

        let mut manifest = match self.manifests.get_by_path(path)? {
            Some(existing) => existing,
            None => FileManifest::new(path),
        };
        manifest.push_version(version);
        self.manifests.put(manifest.clone())?;

        for block in &blocks {
            self.manager.save_block(block.id, &block.data)?;
        }

        info!(
            path,
            len = payload.len(),
            blocks = blocks.len(),
            versions = manifest.versions.len(),
            "[fs] stored new version"
        );
        let _ = self.manifest_updates.send(manifest.clone());
        Ok(manifest)
    }

    /// Retrieve the newest version of `path`. `None` when the path has no
    /// manifest or the manifest has no versions.
    pub async fn retrieve(&self, path: &str) -> Result<Option<Vec<u8>>, FsError> {
        if path.is_empty() {
            return Err(FsError::InvalidPath);
        }

        let manifest = match self.manifests.get_by_path(path)? {
            Some(manifest) => manifest,
            None => {
                warn!(path, "[fs] manifest cannot be found");
                return Ok(None);
            }
        };
        let version = match manifest.current_version() {
            Some(version) => version,
            None => {
                warn!(path, "[fs] manifest has no versions");
                return Ok(None);
            }
        };

        if let Some(payload) = self.cache.get(manifest.id, version.id) {
            debug!(path, version = %version.id, "[fs] cache hit");
            return Ok(Some(payload));
        }

        let payload = self.manager.retrieve(version).await?;
        self.cache.put(manifest.id, version.id, payload.clone());
        Ok(Some(payload))
    }

    /// Pull one block from a remote source into the local tiers. Returns
    /// whether the block was obtained; every failure mode is recoverable,
    /// so nothing is raised. The synchronizer's repair tick lives on this.
    pub async fn synchronize_block(&self, id: BlockId) -> bool {
        if id.is_nil() {
            return false;
        }
        let block = match self.manager.get_block(id, Scope::RemoteOnly).await {
            Ok(Some(block)) => block,
            Ok(None) => return false,
            Err(e) => {
                warn!(%id, error = %e, "[fs] remote fetch during repair failed");
                return false;
            }
        };
        match self.manager.save_block(id, &block) {
            Ok(()) => true,
            Err(e) => {
                warn!(%id, error = %e, "[fs] could not store repaired block");
                false
            }
        }
    }

    /// Accept a manifest pushed by a peer. Persists without re-announcing;
    /// echoing the update back out would bounce manifests between peers.
    pub fn apply_remote_manifest(&self, manifest: FileManifest) -> Result<(), FsError> {
        debug!(path = %manifest.path, id = %manifest.id, "[fs] manifest received from peer");
        self.manifests.put(manifest)?;
        Ok(())
    }

    /// Every known manifest, for the synchronizer's scan.
    pub fn read_all_manifests(&self) -> Result<Vec<FileManifest>, FsError> {
        Ok(self.manifests.read_all()?)
    }

    /// Block ids held by any local tier.
    pub fn stored_block_identifiers(&self) -> std::collections::HashSet<BlockId> {
        self.manager.stored_identifiers()
    }

    /// True once every local filer finished its startup load.
    pub fn local_stores_loaded(&self) -> bool {
        self.manager.local_stores_loaded()
    }

    /// New versions stored locally, for the peer layer to push out.
    pub fn subscribe_manifest_updates(&self) -> broadcast::Receiver<FileManifest> {
        self.manifest_updates.subscribe()
    }

    /// Replacement activity of the retrieved-file cache.
    pub fn subscribe_cache_replacements(&self) -> broadcast::Receiver<crate::cache::CacheActivity> {
        self.cache.subscribe_replacements()
    }

    /// The storage manager, for wiring remote sources in and out.
    pub fn storage_manager(&self) -> &Arc<StorageManager> {
        &self.manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bm_block_store::{BlockCodec, MemoryFiler, MemoryStoreConfig};
    use crate::manifest::InMemoryManifestStore;

    const BLOCK_SIZE: usize = 1024;
    const MAX_FILE: u64 = 10 * 1024 * 1024;

    fn filesystem() -> FileSystem {
        let manager = Arc::new(StorageManager::new(BlockCodec::new(BLOCK_SIZE)));
        manager.add_filer(Arc::new(MemoryFiler::new(MemoryStoreConfig {
            block_size: BLOCK_SIZE,
            capacity: 500,
        })));
        let manifests = Arc::new(ManifestStore::new(Arc::new(InMemoryManifestStore::new())));
        FileSystem::new(manager, manifests, MAX_FILE)
    }

    fn payload_of(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_store_then_retrieve_round_trips() {
        let fs = filesystem();
        let payload = payload_of(5000);

        let manifest = fs.store(r"\\server\f.bin", &payload).unwrap();
        let version = manifest.current_version().unwrap();
        // 4 full blocks + one partial holding the 856-byte tail.
        assert_eq!(version.blocks.len(), 5);
        assert_eq!(version.unencrypted_len, 5000);

        let retrieved = fs.retrieve(r"\\server\f.bin").await.unwrap();
        assert_eq!(retrieved, Some(payload));
    }

    #[tokio::test]
    async fn test_retrieve_unknown_path_is_none() {
        let fs = filesystem();
        assert_eq!(fs.retrieve(r"\\server\none").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_validates_input() {
        let fs = filesystem();
        assert!(matches!(fs.store("", b"data"), Err(FsError::InvalidPath)));
        assert!(matches!(
            fs.store(r"\\server\f.bin", b""),
            Err(FsError::EmptyPayload)
        ));

        let oversize = payload_of((MAX_FILE + 1) as usize);
        assert!(matches!(
            fs.store(r"\\server\f.bin", &oversize),
            Err(FsError::FileTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_second_store_stacks_a_version() {
        let fs = filesystem();
        fs.store(r"\\server\f.bin", &payload_of(100)).unwrap();
        let manifest = fs.store(r"\\server\f.bin", &payload_of(200)).unwrap();

        assert_eq!(manifest.versions.len(), 2);
        assert_eq!(manifest.current_version().unwrap().unencrypted_len, 200);

        // Retrieval serves the newest version.
        let retrieved = fs.retrieve(r"\\server\f.bin").await.unwrap().unwrap();
        assert_eq!(retrieved, payload_of(200));
    }

    #[tokio::test]
    async fn test_store_emits_manifest_update() {
        let fs = filesystem();
        let mut updates = fs.subscribe_manifest_updates();

        let manifest = fs.store(r"\\server\f.bin", &payload_of(10)).unwrap();
        let announced = updates.try_recv().unwrap();
        assert_eq!(announced.id, manifest.id);
    }

    #[tokio::test]
    async fn test_apply_remote_manifest_does_not_reannounce() {
        let fs = filesystem();
        let mut updates = fs.subscribe_manifest_updates();

        let mut manifest = FileManifest::new(r"\\server\pushed.bin");
        manifest.push_version(VersionManifest::new(10, vec![BlockId::random()]));
        fs.apply_remote_manifest(manifest.clone()).unwrap();

        assert!(updates.try_recv().is_err());
        assert_eq!(
            fs.read_all_manifests().unwrap().first().map(|m| m.id),
            Some(manifest.id)
        );
    }

    #[tokio::test]
    async fn test_synchronize_block_with_no_remote_fails() {
        let fs = filesystem();
        assert!(!fs.synchronize_block(BlockId::random()).await);
        assert!(!fs.synchronize_block(BlockId::nil()).await);
    }

    #[tokio::test]
    async fn test_repeat_retrieve_is_served_from_cache() {
        let fs = filesystem();
        let payload = payload_of(3000);
        let manifest = fs.store(r"\\server\f.bin", &payload).unwrap();

        // Prime the cache, then delete the blocks underneath it.
        assert_eq!(fs.retrieve(r"\\server\f.bin").await.unwrap(), Some(payload.clone()));
        for version in &manifest.versions {
            for &id in &version.blocks {
                fs.storage_manager().delete_block(id).unwrap();
            }
        }

        assert_eq!(fs.retrieve(r"\\server\f.bin").await.unwrap(), Some(payload));
    }
}

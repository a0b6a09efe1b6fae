//! # Single-Node Flows
//!
//! Store/retrieve through the full local stack: codec, slot file, memory
//! tier, manifest store and file system, with real files on disk.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use bm_block_store::{
        BlockCodec, Filer, LocalFiler, LocalStoreConfig, MemoryFiler, MemoryStoreConfig, Scope,
        StorageManager,
    };
    use bm_file_system::{FileSystem, JsonFileManifestStore, ManifestStore};

    const BLOCK_SIZE: usize = 1024;
    const MAX_FILE: u64 = 10 * 1024 * 1024;

    fn build_filesystem(dir: &TempDir) -> Arc<FileSystem> {
        let manager = Arc::new(StorageManager::new(BlockCodec::new(BLOCK_SIZE)));
        let local = LocalFiler::open(LocalStoreConfig {
            path: dir.path().join("storage.dat"),
            block_size: BLOCK_SIZE,
            max_store_bytes: MAX_FILE,
        })
        .unwrap();
        manager.add_filer(Arc::new(MemoryFiler::new(MemoryStoreConfig {
            block_size: BLOCK_SIZE,
            capacity: 500,
        })));
        manager.add_filer(local);

        let manifests = Arc::new(ManifestStore::new(Arc::new(
            JsonFileManifestStore::open(dir.path().join("manifests.json")).unwrap(),
        )));
        Arc::new(FileSystem::new(manager, manifests, MAX_FILE))
    }

    fn payload_of(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_5000_byte_file_becomes_five_blocks() {
        let dir = TempDir::new().unwrap();
        let fs = build_filesystem(&dir);
        let payload = payload_of(5000);

        let manifest = fs.store(r"\\server\f.bin", &payload).unwrap();
        let version = manifest.current_version().unwrap();

        // 4 full blocks plus a padded tail of 5000 - 4*1024 = 904 bytes.
        assert_eq!(version.blocks.len(), 5);
        assert_eq!(version.unencrypted_len, 5000);

        let retrieved = fs.retrieve(r"\\server\f.bin").await.unwrap();
        assert_eq!(retrieved, Some(payload));
    }

    #[tokio::test]
    async fn test_every_block_lands_in_both_tiers() {
        let dir = TempDir::new().unwrap();
        let fs = build_filesystem(&dir);

        let manifest = fs.store(r"\\server\f.bin", &payload_of(3000)).unwrap();
        let version = manifest.current_version().unwrap();

        // Blocks are fanned out to every local filer, so each id resolves
        // locally and the stored-identifier union covers the version.
        let stored = fs.stored_block_identifiers();
        for &id in &version.blocks {
            assert!(stored.contains(&id));
            let found = fs
                .storage_manager()
                .get_block(id, Scope::LocalOnly)
                .await
                .unwrap();
            assert!(found.is_some());
        }
    }

    #[tokio::test]
    async fn test_restart_serves_from_reloaded_slot_file() {
        let dir = TempDir::new().unwrap();
        let payload = payload_of(2500);

        {
            let fs = build_filesystem(&dir);
            fs.store(r"\\server\f.bin", &payload).unwrap();
        }

        // A fresh stack over the same data directory rebuilds the slot
        // index in the background and serves the same bytes.
        let fs = build_filesystem(&dir);
        let retrieved = fs.retrieve(r"\\server\f.bin").await.unwrap();
        assert_eq!(retrieved, Some(payload));
    }

    #[tokio::test]
    async fn test_cold_start_callers_block_until_loaded() {
        let dir = TempDir::new().unwrap();
        let payload = payload_of(40 * BLOCK_SIZE);
        {
            let fs = build_filesystem(&dir);
            fs.store(r"\\server\big.bin", &payload).unwrap();
        }

        // Hit the filer immediately after open; the get must wait for the
        // index load rather than answer from a half-built index.
        let filer = LocalFiler::open(LocalStoreConfig {
            path: dir.path().join("storage.dat"),
            block_size: BLOCK_SIZE,
            max_store_bytes: MAX_FILE,
        })
        .unwrap();
        let ids = filer.identifiers();
        assert_eq!(ids.len(), 40);
        assert!(filer.is_loaded());
        assert!(filer.get(ids[0]).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_versions_stack_and_newest_wins() {
        let dir = TempDir::new().unwrap();
        let fs = build_filesystem(&dir);

        fs.store(r"\\server\f.bin", &payload_of(1000)).unwrap();
        fs.store(r"\\server\f.bin", &payload_of(2000)).unwrap();
        let manifest = fs.store(r"\\server\f.bin", &payload_of(300)).unwrap();

        assert_eq!(manifest.versions.len(), 3);
        let retrieved = fs.retrieve(r"\\server\f.bin").await.unwrap();
        assert_eq!(retrieved, Some(payload_of(300)));
    }
}

//! # Synchronizer Service
//!
//! Owns the repair queue and the two periodic tasks. `scan_once` and
//! `repair_once` are public so tests (and operators) can drive ticks
//! deterministically without waiting on timers.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use bm_file_system::FileSystem;
use shared_types::BlockId;

use crate::queue::RepairQueue;

/// Timer configuration for the two reconciliation tasks.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How often the manifest/storage diff runs.
    pub scan_interval: Duration,
    /// How often one queued repair is attempted.
    pub repair_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(60),
            repair_interval: Duration::from_secs(5),
        }
    }
}

/// Background reconciliation over one node's manifests and local storage.
pub struct Synchronizer {
    filesystem: Arc<FileSystem>,
    queue: Mutex<RepairQueue>,
    config: SyncConfig,
}

impl Synchronizer {
    pub fn new(filesystem: Arc<FileSystem>, config: SyncConfig) -> Self {
        Self {
            filesystem,
            queue: Mutex::new(RepairQueue::new()),
            config,
        }
    }

    /// One scan tick: queue every manifest-referenced block id that is
    /// neither held locally nor already queued.
    ///
    /// Skips entirely until the local filers report their startup load
    /// complete — diffing against a half-built index would queue blocks the
    /// node already holds.
    pub fn scan_once(&self) {
        if !self.filesystem.local_stores_loaded() {
            debug!("[sync] local stores still loading; skipping scan");
            return;
        }

        let manifests = match self.filesystem.read_all_manifests() {
            Ok(manifests) => manifests,
            Err(e) => {
                warn!(error = %e, "[sync] manifest listing failed; skipping scan");
                return;
            }
        };
        let local = self.filesystem.stored_block_identifiers();

        let mut queued = 0usize;
        let mut queue = self.queue.lock();
        for manifest in &manifests {
            for id in manifest.all_block_ids() {
                if !local.contains(&id) && queue.push_unique(id) {
                    debug!(%id, path = %manifest.path, "[sync] block missing locally; queued");
                    queued += 1;
                }
            }
        }
        drop(queue);

        if queued > 0 {
            info!(queued, "[sync] scan queued missing blocks");
        }
    }

    /// One repair tick: pop the newest queued id and try to pull it from a
    /// remote source. A miss re-queues the id for a later tick; peer state
    /// changing over time is the only retry driver.
    ///
    /// Returns whether a block was repaired.
    pub async fn repair_once(&self) -> bool {
        let id = match self.queue.lock().pop() {
            Some(id) => id,
            None => return false,
        };

        debug!(%id, "[sync] attempting repair");
        if self.filesystem.synchronize_block(id).await {
            info!(%id, "[sync] block repaired from remote source");
            true
        } else {
            warn!(%id, "[sync] unable to retrieve from any remote store; re-queueing");
            self.queue.lock().push_unique(id);
            false
        }
    }

    /// Number of repairs currently pending.
    pub fn pending_repairs(&self) -> usize {
        self.queue.lock().len()
    }

    /// Snapshot of the queued block ids.
    pub fn pending_snapshot(&self) -> Vec<BlockId> {
        self.queue.lock().snapshot()
    }

    /// Spawn the scan and repair tasks on their own schedules. Both stop
    /// when `shutdown` flips.
    pub fn spawn(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let scan = {
            let sync = Arc::clone(self);
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(sync.config.scan_interval);
                loop {
                    tokio::select! {
                        _ = interval.tick() => sync.scan_once(),
                        _ = shutdown.changed() => {
                            info!("[sync] scan task stopping");
                            break;
                        }
                    }
                }
            })
        };

        let repair = {
            let sync = Arc::clone(self);
            let mut shutdown = shutdown;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(sync.config.repair_interval);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            sync.repair_once().await;
                        }
                        _ = shutdown.changed() => {
                            info!("[sync] repair task stopping");
                            break;
                        }
                    }
                }
            })
        };

        vec![scan, repair]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bm_block_store::{BlockCodec, MemoryFiler, MemoryStoreConfig, Scope, StorageManager};
    use bm_file_system::{InMemoryManifestStore, ManifestStore};
    use parking_lot::Mutex as PlMutex;
    use shared_types::remote::{RemoteBlockSource, RemoteError};
    use shared_types::{FileManifest, SourceId, VersionManifest};
    use std::collections::HashMap;
    use uuid::Uuid;

    const BLOCK_SIZE: usize = 64;

    struct FakeRemote {
        id: SourceId,
        blocks: PlMutex<HashMap<BlockId, Vec<u8>>>,
    }

    impl FakeRemote {
        fn holding(entries: Vec<(BlockId, Vec<u8>)>) -> Arc<Self> {
            Arc::new(Self {
                id: Uuid::new_v4(),
                blocks: PlMutex::new(entries.into_iter().collect()),
            })
        }
    }

    #[async_trait]
    impl RemoteBlockSource for FakeRemote {
        fn id(&self) -> SourceId {
            self.id
        }

        async fn get_block(&self, id: BlockId) -> Result<Option<Vec<u8>>, RemoteError> {
            Ok(self.blocks.lock().get(&id).cloned())
        }

        fn avg_latency(&self) -> Duration {
            Duration::ZERO
        }
    }

    fn filesystem() -> Arc<FileSystem> {
        let manager = Arc::new(StorageManager::new(BlockCodec::new(BLOCK_SIZE)));
        manager.add_filer(Arc::new(MemoryFiler::new(MemoryStoreConfig {
            block_size: BLOCK_SIZE,
            capacity: 500,
        })));
        let manifests = Arc::new(ManifestStore::new(Arc::new(InMemoryManifestStore::new())));
        Arc::new(FileSystem::new(manager, manifests, 1024 * 1024))
    }

    fn block(fill: u8) -> Vec<u8> {
        vec![fill; BLOCK_SIZE]
    }

    /// A manifest referencing {a, b, c} where only `a` is local and only
    /// `b` is remotely obtainable: after scan + repairs, local storage
    /// holds {a, b} and `c` stays queued.
    #[tokio::test]
    async fn test_scan_and_repair_fill_the_gap() {
        let fs = filesystem();
        let sync = Synchronizer::new(Arc::clone(&fs), SyncConfig::default());

        let a = BlockId::random();
        let b = BlockId::random();
        let c = BlockId::random();
        fs.storage_manager().save_block(a, &block(0xA1)).unwrap();
        fs.storage_manager()
            .add_remote_source(FakeRemote::holding(vec![(b, block(0xB2))]));

        let mut manifest = FileManifest::new(r"\\server\f.bin");
        manifest.push_version(VersionManifest::new(3 * BLOCK_SIZE as u64, vec![a, b, c]));
        fs.apply_remote_manifest(manifest).unwrap();

        sync.scan_once();
        assert_eq!(sync.pending_repairs(), 2);

        // Enough repair ticks for both queued ids (c fails, b succeeds).
        sync.repair_once().await;
        sync.repair_once().await;
        sync.repair_once().await;

        let local = fs.stored_block_identifiers();
        assert!(local.contains(&a));
        assert!(local.contains(&b));
        assert!(!local.contains(&c));
        assert_eq!(sync.pending_snapshot(), vec![c]);

        // b is now served from the local tiers.
        let found = fs
            .storage_manager()
            .get_block(b, Scope::LocalOnly)
            .await
            .unwrap();
        assert_eq!(found, Some(block(0xB2)));
    }

    #[tokio::test]
    async fn test_rescan_does_not_duplicate_queue_entries() {
        let fs = filesystem();
        let sync = Synchronizer::new(Arc::clone(&fs), SyncConfig::default());

        let missing = BlockId::random();
        let mut manifest = FileManifest::new(r"\\server\f.bin");
        manifest.push_version(VersionManifest::new(BLOCK_SIZE as u64, vec![missing]));
        fs.apply_remote_manifest(manifest).unwrap();

        sync.scan_once();
        sync.scan_once();
        assert_eq!(sync.pending_repairs(), 1);
    }

    #[tokio::test]
    async fn test_repair_tick_with_empty_queue_is_noop() {
        let fs = filesystem();
        let sync = Synchronizer::new(fs, SyncConfig::default());
        assert!(!sync.repair_once().await);
    }

    #[tokio::test]
    async fn test_scan_skips_blocks_already_local() {
        let fs = filesystem();
        let sync = Synchronizer::new(Arc::clone(&fs), SyncConfig::default());

        let held = BlockId::random();
        fs.storage_manager().save_block(held, &block(1)).unwrap();
        let mut manifest = FileManifest::new(r"\\server\f.bin");
        manifest.push_version(VersionManifest::new(BLOCK_SIZE as u64, vec![held]));
        fs.apply_remote_manifest(manifest).unwrap();

        sync.scan_once();
        assert_eq!(sync.pending_repairs(), 0);
    }
}

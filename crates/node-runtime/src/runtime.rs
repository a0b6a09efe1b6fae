//! # Node Runtime
//!
//! Construct-once wiring of the whole daemon. Storage, manifests, file
//! system, synchronizer and peer network are built here and passed by
//! explicit reference — no globals.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{info, warn};

use bm_block_store::{BlockCodec, LocalFiler, LocalStoreConfig, MemoryFiler, MemoryStoreConfig, StorageManager};
use bm_file_system::{FileSystem, JsonFileManifestStore, ManifestStore};
use bm_peer_net::{PeerDirectory, PeerEvent, RpcServer};
use bm_sync::{SyncConfig, Synchronizer};
use shared_types::PeerDescriptor;

use crate::adapters::{FileSystemBlockProvider, FileSystemManifestSink};
use crate::config::NodeConfig;

/// File names inside the data directory.
const STORE_FILE: &str = "storage.dat";
const MANIFEST_FILE: &str = "manifests.json";

/// The assembled daemon.
pub struct NodeRuntime {
    filesystem: Arc<FileSystem>,
    synchronizer: Arc<Synchronizer>,
    directory: Arc<PeerDirectory>,
    descriptor: PeerDescriptor,
    shutdown_tx: watch::Sender<bool>,
}

impl NodeRuntime {
    /// Build every subsystem and start the background tasks.
    pub async fn start(config: NodeConfig) -> anyhow::Result<Self> {
        info!("[node] starting blockmesh node");
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Storage tiers. The slot file starts loading its index in the
        // background; callers block on it as needed.
        let manager = Arc::new(StorageManager::new(BlockCodec::new(config.storage.block_size)));
        let local = LocalFiler::open(LocalStoreConfig {
            path: config.node.data_dir.join(STORE_FILE),
            block_size: config.storage.block_size,
            max_store_bytes: config.storage.max_store_bytes,
        })
        .context("opening local slot-file store")?;
        manager.add_filer(Arc::new(MemoryFiler::new(MemoryStoreConfig {
            block_size: config.storage.block_size,
            capacity: config.storage.memory_capacity,
        })));
        manager.add_filer(local);

        // Manifests and the file system over both.
        let manifests = Arc::new(ManifestStore::new(Arc::new(
            JsonFileManifestStore::open(config.node.data_dir.join(MANIFEST_FILE))
                .context("opening manifest store")?,
        )));
        let filesystem = Arc::new(FileSystem::new(
            Arc::clone(&manager),
            manifests,
            config.storage.max_file_bytes,
        ));

        // Peer network: server, directory, loop-back wiring.
        let server = RpcServer::bind(
            &config.listen_addr(),
            &config.node.host,
            FileSystemBlockProvider::new(Arc::clone(&filesystem)),
            FileSystemManifestSink::new(Arc::clone(&filesystem)),
        )
        .await
        .context("binding RPC server")?;
        let descriptor = server.descriptor();
        let directory = PeerDirectory::new(descriptor.clone(), config.liveness_interval());
        server.start(Arc::clone(&directory), shutdown_rx.clone());

        // Connection events drive the storage manager's remote registry.
        Self::spawn_event_pump(&directory, &manager, shutdown_rx.clone());
        // New local versions fan out to every connected peer.
        Self::spawn_manifest_push(&filesystem, &directory, shutdown_rx.clone());

        // Reconciliation loop.
        let synchronizer = Arc::new(Synchronizer::new(
            Arc::clone(&filesystem),
            SyncConfig {
                scan_interval: config.scan_interval(),
                repair_interval: config.repair_interval(),
            },
        ));
        synchronizer.spawn(shutdown_rx.clone());

        // Dial the configured peers.
        let _ = directory.spawn_discovery(config.peers.addresses.clone(), shutdown_rx);

        info!(server = %descriptor, "[node] node is up");
        Ok(Self {
            filesystem,
            synchronizer,
            directory,
            descriptor,
            shutdown_tx,
        })
    }

    fn spawn_event_pump(
        directory: &Arc<PeerDirectory>,
        manager: &Arc<StorageManager>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut events = directory.subscribe();
        let manager = Arc::clone(manager);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(PeerEvent::RemoteStoreConnected(source)) => {
                            manager.add_remote_source(source);
                        }
                        Ok(PeerEvent::RemoteDisconnected(id)) => {
                            manager.remove_source(id);
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "[node] peer event pump lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                    _ = shutdown.changed() => break,
                }
            }
        });
    }

    fn spawn_manifest_push(
        filesystem: &Arc<FileSystem>,
        directory: &Arc<PeerDirectory>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut updates = filesystem.subscribe_manifest_updates();
        let directory = Arc::clone(directory);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = updates.recv() => match update {
                        Ok(manifest) => directory.push_manifest(&manifest).await,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "[node] manifest push pump lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                    _ = shutdown.changed() => break,
                }
            }
        });
    }

    /// The file system, for embedding and tests.
    pub fn filesystem(&self) -> &Arc<FileSystem> {
        &self.filesystem
    }

    /// The synchronizer, for driving ticks deterministically in tests.
    pub fn synchronizer(&self) -> &Arc<Synchronizer> {
        &self.synchronizer
    }

    /// The peer directory.
    pub fn directory(&self) -> &Arc<PeerDirectory> {
        &self.directory
    }

    /// This node's server identity.
    pub fn descriptor(&self) -> PeerDescriptor {
        self.descriptor.clone()
    }

    /// Stop background tasks and drop every peer connection.
    pub fn shutdown(&self) {
        info!("[node] shutting down");
        let _ = self.shutdown_tx.send(true);
        self.directory.unload_all();
    }
}

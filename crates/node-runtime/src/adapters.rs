//! # Port Adapters
//!
//! Implementations of the peer-network ports over the file system. The
//! byte transferor serves from the local tiers only: answering a peer by
//! asking another peer would let two nodes bounce a missing-block request
//! between each other indefinitely, and nothing pre-empts a hung remote
//! call before the next liveness tick.

use async_trait::async_trait;
use std::sync::Arc;

use tracing::warn;

use bm_file_system::FileSystem;
use bm_peer_net::{BlockProvider, ManifestRejected, ManifestSink};
use bm_block_store::Scope;
use shared_types::{BlockId, FileManifest};

/// Serves peers' block-get calls from this node's local tiers.
pub struct FileSystemBlockProvider {
    filesystem: Arc<FileSystem>,
}

impl FileSystemBlockProvider {
    pub fn new(filesystem: Arc<FileSystem>) -> Arc<Self> {
        Arc::new(Self { filesystem })
    }
}

#[async_trait]
impl BlockProvider for FileSystemBlockProvider {
    async fn get_block(&self, id: BlockId) -> Option<Vec<u8>> {
        match self
            .filesystem
            .storage_manager()
            .get_block(id, Scope::LocalOnly)
            .await
        {
            Ok(block) => block,
            Err(e) => {
                warn!(%id, error = %e, "[node] block lookup for peer failed");
                None
            }
        }
    }
}

/// Accepts manifests pushed by peers into the manifest store.
pub struct FileSystemManifestSink {
    filesystem: Arc<FileSystem>,
}

impl FileSystemManifestSink {
    pub fn new(filesystem: Arc<FileSystem>) -> Arc<Self> {
        Arc::new(Self { filesystem })
    }
}

impl ManifestSink for FileSystemManifestSink {
    fn apply_manifest(&self, manifest: FileManifest) -> Result<(), ManifestRejected> {
        self.filesystem
            .apply_remote_manifest(manifest)
            .map_err(|e| ManifestRejected(e.to_string()))
    }
}

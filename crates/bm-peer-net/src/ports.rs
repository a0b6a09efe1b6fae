//! # Outbound Ports
//!
//! What the host application provides so the transferors can serve peers.
//! The node runtime implements both over the file system.

use async_trait::async_trait;
use thiserror::Error;

use shared_types::{BlockId, FileManifest};

/// Serves block payloads to peers.
///
/// Implementations must answer from node-local storage only; relaying the
/// lookup to further peers would let a missing block bounce between nodes
/// with nothing to pre-empt the cycle.
#[async_trait]
pub trait BlockProvider: Send + Sync {
    /// `None` when the block is not held on this node.
    async fn get_block(&self, id: BlockId) -> Option<Vec<u8>>;
}

/// The serving side could not accept a pushed manifest.
#[derive(Debug, Error)]
#[error("manifest rejected: {0}")]
pub struct ManifestRejected(pub String);

/// Accepts manifests pushed by peers.
pub trait ManifestSink: Send + Sync {
    fn apply_manifest(&self, manifest: FileManifest) -> Result<(), ManifestRejected>;
}

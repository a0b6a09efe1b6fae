//! # Manifests
//!
//! Metadata describing logical files. A [`FileManifest`] binds a universal
//! naming path to a stack of immutable [`VersionManifest`]s; the newest
//! version is always the retrievable one. Manifests travel between peers
//! verbatim, so both types are plain serde data.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::ids::BlockId;

/// Unix timestamp in seconds since epoch.
pub type Timestamp = u64;

/// One immutable version of a logical file.
///
/// `blocks` is insertion-ordered and duplicate-free: reassembly concatenates
/// payloads in exactly this order, then trims the final block using
/// `unencrypted_len`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionManifest {
    /// Version identifier.
    pub id: Uuid,
    /// When this version was created (local clock of the storing node).
    pub created: Timestamp,
    /// Length of the original payload before padding.
    pub unencrypted_len: u64,
    /// Identifiers of the blocks composing this version, in payload order.
    pub blocks: Vec<BlockId>,
}

impl VersionManifest {
    /// Build a manifest for a payload of `unencrypted_len` bytes split into
    /// `blocks`.
    pub fn new(unencrypted_len: u64, blocks: Vec<BlockId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created: now(),
            unencrypted_len,
            blocks,
        }
    }

    /// True when `id` is referenced by this version.
    pub fn references(&self, id: BlockId) -> bool {
        self.blocks.contains(&id)
    }
}

/// The version history of one logical file path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileManifest {
    /// File identifier, stable across versions.
    pub id: Uuid,
    /// Universal naming path, e.g. `\\server\share\f.bin`.
    pub path: String,
    /// Version stack, newest last. Versions are never removed; the whole
    /// manifest is replaced on update.
    pub versions: Vec<VersionManifest>,
}

impl FileManifest {
    /// Start a history for a new path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            versions: Vec::new(),
        }
    }

    /// Push a new version on top of the stack.
    pub fn push_version(&mut self, version: VersionManifest) {
        self.versions.push(version);
    }

    /// The newest version, if any exists.
    pub fn current_version(&self) -> Option<&VersionManifest> {
        self.versions.last()
    }

    /// Every block id referenced by any version.
    pub fn all_block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.versions.iter().flat_map(|v| v.blocks.iter().copied())
    }
}

fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_version_is_newest() {
        let mut manifest = FileManifest::new(r"\\server\f.bin");
        assert!(manifest.current_version().is_none());

        let first = VersionManifest::new(10, vec![BlockId::random()]);
        let second = VersionManifest::new(20, vec![BlockId::random()]);
        manifest.push_version(first);
        manifest.push_version(second.clone());

        assert_eq!(manifest.current_version(), Some(&second));
        assert_eq!(manifest.versions.len(), 2);
    }

    #[test]
    fn test_all_block_ids_spans_versions() {
        let a = BlockId::random();
        let b = BlockId::random();
        let mut manifest = FileManifest::new(r"\\server\f.bin");
        manifest.push_version(VersionManifest::new(1, vec![a]));
        manifest.push_version(VersionManifest::new(2, vec![b]));

        let ids: Vec<_> = manifest.all_block_ids().collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_manifest_serde_round_trip() {
        let mut manifest = FileManifest::new(r"\\server\f.bin");
        manifest.push_version(VersionManifest::new(42, vec![BlockId::random()]));

        let json = serde_json::to_string(&manifest).unwrap();
        let back: FileManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, manifest);
    }
}

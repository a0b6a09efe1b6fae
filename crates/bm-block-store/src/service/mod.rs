//! # Storage Manager
//!
//! Composes N local filers and M remote block sources behind one
//! get/save/delete contract.
//!
//! ## Resolution Policy
//!
//! `get_block` consults local filers in ascending observed-latency order
//! and returns the first hit; when the scope permits, remote sources are
//! consulted the same way afterwards. Saves and deletes fan out to every
//! local filer — the tiers hold redundant copies by design, not shards.
//!
//! ## Locking
//!
//! The local-filer and remote-source registries are guarded by independent
//! locks and are never held at the same time, nor across an await point.


use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use shared_types::{BlockId, SourceId, StoreId, VersionManifest};

use crate::domain::codec::BlockCodec;
use crate::domain::errors::StoreError;
use crate::domain::value_objects::Scope;
use crate::ports::{Filer, RemoteBlockSource};

/// Multi-source block resolver owning the filer and remote registries.
pub struct StorageManager {
    id: StoreId,
    codec: BlockCodec,
    local_filers: RwLock<HashMap<StoreId, Arc<dyn Filer>>>,
    remote_sources: RwLock<HashMap<SourceId, Arc<dyn RemoteBlockSource>>>,
}

impl StorageManager {
    pub fn new(codec: BlockCodec) -> Self {
        Self {
            id: Uuid::new_v4(),
            codec,
            local_filers: RwLock::new(HashMap::with_capacity(2)),
            remote_sources: RwLock::new(HashMap::with_capacity(3)),
        }
    }

    pub fn id(&self) -> StoreId {
        self.id
    }

    pub fn codec(&self) -> &BlockCodec {
        &self.codec
    }

    /// Register a local tier. A filer id already present is left untouched.
    pub fn add_filer(&self, filer: Arc<dyn Filer>) {
        let mut filers = self.local_filers.write();
        filers.entry(filer.id()).or_insert(filer);
    }

    /// Register a remote source as a peer's byte channel comes up.
    /// A source id already present is left untouched.
    pub fn add_remote_source(&self, source: Arc<dyn RemoteBlockSource>) {
        let mut sources = self.remote_sources.write();
        let id = source.id();
        if sources.insert(id, source).is_none() {
            debug!(source = %id, "[store] remote source registered");
        }
    }

    /// Deregister by id from whichever registry holds it. Fired on liveness
    /// failure and explicit unload.
    pub fn remove_source(&self, id: Uuid) {
        if self.local_filers.write().remove(&id).is_some() {
            debug!(store = %id, "[store] local filer removed");
            return;
        }
        if self.remote_sources.write().remove(&id).is_some() {
            debug!(source = %id, "[store] remote source removed");
        }
    }

    /// Local filers in ascending observed-latency order.
    fn local_by_latency(&self) -> Vec<Arc<dyn Filer>> {
        let mut filers: Vec<_> = self.local_filers.read().values().cloned().collect();
        filers.sort_by_key(|f| f.avg_latency());
        filers
    }

    /// Remote sources in ascending observed-latency order.
    fn remote_by_latency(&self) -> Vec<Arc<dyn RemoteBlockSource>> {
        let mut sources: Vec<_> = self.remote_sources.read().values().cloned().collect();
        sources.sort_by_key(|s| s.avg_latency());
        sources
    }

    /// Resolve one block within `scope`. `None` when every permitted source
    /// misses. Remote failures are logged and treated as misses.
    pub async fn get_block(&self, id: BlockId, scope: Scope) -> Result<Option<Vec<u8>>, StoreError> {
        if id.is_nil() {
            return Err(StoreError::NilIdentifier);
        }

        if scope.includes_local() {
            for filer in self.local_by_latency() {
                if let Some(block) = filer.get(id)? {
                    return Ok(Some(block));
                }
            }
        }

        if scope.includes_remote() {
            for source in self.remote_by_latency() {
                match source.get_block(id).await {
                    Ok(Some(block)) => return Ok(Some(block)),
                    Ok(None) => {}
                    Err(e) => {
                        warn!(source = %source.id(), error = %e, "[store] remote fetch failed; treating as miss");
                    }
                }
            }
        }

        Ok(None)
    }

    /// Store one block in every local tier.
    ///
    /// Intentional redundancy: all local tiers receive every block. A tier's
    /// duplicate/full no-op is not an error; invalid input aborts the fan-out.
    pub fn save_block(&self, id: BlockId, data: &[u8]) -> Result<(), StoreError> {
        for filer in self.local_by_latency() {
            filer.save(id, data)?;
        }
        Ok(())
    }

    /// Remove one block from every local tier.
    pub fn delete_block(&self, id: BlockId) -> Result<(), StoreError> {
        for filer in self.local_by_latency() {
            filer.delete(id)?;
        }
        Ok(())
    }

    /// Resolve every block of `manifest` and reassemble the payload,
    /// trimmed to the recorded length.
    ///
    /// # Errors
    ///
    /// `BlockUnavailable` names the first block no permitted source holds.
    pub async fn retrieve(&self, manifest: &VersionManifest) -> Result<Vec<u8>, StoreError> {
        let mut payloads = Vec::with_capacity(manifest.blocks.len());
        for &block_id in &manifest.blocks {
            match self.get_block(block_id, Scope::Any).await? {
                Some(data) => payloads.push(data),
                None => return Err(StoreError::BlockUnavailable(block_id)),
            }
        }
        Ok(self.codec.reassemble(&payloads, manifest.unencrypted_len))
    }

    /// Union of block ids held by any local filer.
    pub fn stored_identifiers(&self) -> HashSet<BlockId> {
        let filers: Vec<_> = self.local_filers.read().values().cloned().collect();
        let mut ids = HashSet::new();
        for filer in filers {
            ids.extend(filer.identifiers());
        }
        ids
    }

    /// True once every registered local filer finished its startup load.
    pub fn local_stores_loaded(&self) -> bool {
        self.local_filers.read().values().all(|f| f.is_loaded())
    }
}

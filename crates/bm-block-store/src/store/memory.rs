//! # Memory Filer
//!
//! Ephemeral bounded map of blocks. Serves as the fast first tier ahead of
//! the slot file; a save on a full or duplicate entry is a rejected no-op
//! (logged, not errored), so the disk tier remains the durable copy.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use uuid::Uuid;

use shared_types::{BlockId, LatencyWindow, StoreId};

use crate::domain::errors::StoreError;
use crate::domain::value_objects::MemoryStoreConfig;
use crate::ports::Filer;

/// Bounded in-memory block store.
pub struct MemoryFiler {
    id: StoreId,
    config: MemoryStoreConfig,
    blocks: RwLock<HashMap<BlockId, Vec<u8>>>,
    latency: LatencyWindow,
}

impl MemoryFiler {
    pub fn new(config: MemoryStoreConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            blocks: RwLock::new(HashMap::with_capacity(config.capacity)),
            config,
            latency: LatencyWindow::new(),
        }
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }
}

impl Default for MemoryFiler {
    fn default() -> Self {
        Self::new(MemoryStoreConfig::default())
    }
}

impl Filer for MemoryFiler {
    fn id(&self) -> StoreId {
        self.id
    }

    fn get(&self, id: BlockId) -> Result<Option<Vec<u8>>, StoreError> {
        if id.is_nil() {
            return Err(StoreError::NilIdentifier);
        }
        let start = Instant::now();
        let block = self.blocks.read().get(&id).cloned();
        self.latency.record_since(start);
        Ok(block)
    }

    fn save(&self, id: BlockId, data: &[u8]) -> Result<(), StoreError> {
        if id.is_nil() {
            return Err(StoreError::NilIdentifier);
        }
        if data.len() != self.config.block_size {
            return Err(StoreError::WrongBlockLength {
                expected: self.config.block_size,
                got: data.len(),
            });
        }
        let start = Instant::now();

        let mut blocks = self.blocks.write();
        if blocks.len() >= self.config.capacity {
            warn!(%id, capacity = self.config.capacity, "[store] memory tier full; not storing");
            return Ok(());
        }
        if blocks.contains_key(&id) {
            warn!(%id, "[store] block already in memory tier; not storing");
            return Ok(());
        }
        blocks.insert(id, data.to_vec());
        drop(blocks);

        self.latency.record_since(start);
        Ok(())
    }

    fn delete(&self, id: BlockId) -> Result<(), StoreError> {
        if id.is_nil() {
            return Err(StoreError::NilIdentifier);
        }
        let start = Instant::now();
        if self.blocks.write().remove(&id).is_some() {
            self.latency.record_since(start);
        } else {
            debug!(%id, "[store] delete of block not in memory tier");
        }
        Ok(())
    }

    fn identifiers(&self) -> Vec<BlockId> {
        self.blocks.read().keys().copied().collect()
    }

    fn is_loaded(&self) -> bool {
        true
    }

    fn avg_latency(&self) -> Duration {
        self.latency.average()
    }
}

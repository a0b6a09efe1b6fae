//! # Local Filer
//!
//! Durable block store over a single binary file of fixed-size slots,
//! append-mostly with in-place reuse of freed slots.
//!
//! ## Startup Load
//!
//! Opening the store spawns a background scan of the whole file in
//! slot-size strides, building the id→offset index; zero-id slots land on
//! the free-slot list. Every public operation blocks on a readiness flag
//! (condition variable, not sleep-polling) until that scan completes —
//! correctness over cold-start latency.
//!
//! ## Locking
//!
//! Two independent locks:
//!
//! | Lock | Guards |
//! |------|--------|
//! | file | every positioned read/write on the backing file |
//! | index | id→offset map, free-slot list, logical end offset |
//!
//! Index lookups never wait on I/O in flight; the file lock is never held
//! while taking the index lock.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_types::{BlockId, LatencyWindow, StoreId, ID_LEN};

use crate::domain::errors::StoreError;
use crate::domain::slot;
use crate::domain::value_objects::LocalStoreConfig;
use crate::ports::Filer;

/// Mutable index state guarded by the index lock.
#[derive(Debug, Default)]
struct SlotIndex {
    /// Offset of the slot holding each stored id.
    offsets: HashMap<BlockId, u64>,
    /// Reclaimed slot offsets, reused LIFO.
    free_slots: Vec<u64>,
    /// Offset one past the last full slot; appends land here.
    end_offset: u64,
}

/// Readiness flag for the startup load, with condvar-based waiting.
#[derive(Debug, Default)]
struct Readiness {
    loaded: Mutex<bool>,
    signal: Condvar,
}

impl Readiness {
    fn wait(&self) {
        let mut loaded = self.loaded.lock();
        while !*loaded {
            self.signal.wait(&mut loaded);
        }
    }

    fn mark_loaded(&self) {
        let mut loaded = self.loaded.lock();
        *loaded = true;
        self.signal.notify_all();
    }

    fn is_loaded(&self) -> bool {
        *self.loaded.lock()
    }
}

/// Durable slot-file block store.
pub struct LocalFiler {
    id: StoreId,
    config: LocalStoreConfig,
    file: Mutex<File>,
    index: Mutex<SlotIndex>,
    readiness: Readiness,
    latency: LatencyWindow,
}

impl LocalFiler {
    /// Open (creating if absent) the slot file and start the background
    /// index load. The returned store is usable immediately; operations
    /// block until the load finishes.
    pub fn open(config: LocalStoreConfig) -> Result<Arc<Self>, StoreError> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&config.path)?;

        let filer = Arc::new(Self {
            id: Uuid::new_v4(),
            config,
            file: Mutex::new(file),
            index: Mutex::new(SlotIndex::default()),
            readiness: Readiness::default(),
            latency: LatencyWindow::new(),
        });

        let loader = Arc::clone(&filer);
        std::thread::Builder::new()
            .name("filer-load".into())
            .spawn(move || loader.load())
            .map_err(StoreError::Io)?;

        Ok(filer)
    }

    /// Scan the file from offset 0 in slot strides and install the index.
    ///
    /// Runs once on the loader thread. All public operations wait on the
    /// readiness flag, so the scan has the file to itself.
    fn load(self: Arc<Self>) {
        let start = Instant::now();
        let slot_size = slot::slot_size(self.config.block_size) as u64;
        let mut index = SlotIndex::default();

        match self.scan_slots(&mut index, slot_size) {
            Ok(slots) => {
                info!(
                    path = %self.config.path.display(),
                    slots,
                    occupied = index.offsets.len(),
                    free = index.free_slots.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "[store] slot file loaded"
                );
            }
            Err(e) => {
                // Keep whatever was indexed before the failure; the store
                // stays usable for the slots it knows about.
                error!(path = %self.config.path.display(), error = %e, "[store] slot scan failed");
            }
        }

        *self.index.lock() = index;
        self.readiness.mark_loaded();
        self.latency.record_since(start);
    }

    fn scan_slots(&self, index: &mut SlotIndex, slot_size: u64) -> Result<u64, StoreError> {
        let file = self.file.lock().try_clone()?;
        let len = file.metadata()?.len();
        if len == 0 {
            warn!(path = %self.config.path.display(), "[store] empty slot file; nothing to load");
            return Ok(0);
        }
        if len % slot_size != 0 {
            warn!(
                len,
                slot_size,
                "[store] slot file length is not slot-aligned; ignoring trailing bytes"
            );
        }

        let mut reader = BufReader::new(file);
        let mut slot_buf = vec![0u8; slot_size as usize];
        let mut slots = 0u64;
        let mut offset = 0u64;
        while offset + slot_size <= len {
            reader.read_exact(&mut slot_buf)?;
            let id = slot::read_id(&slot_buf);
            if id.is_nil() {
                debug!(offset, "[store] free slot");
                index.free_slots.push(offset);
            } else {
                index.offsets.insert(id, offset);
            }
            offset += slot_size;
            slots += 1;
            index.end_offset = offset;
        }
        Ok(slots)
    }

    fn wait_until_loaded(&self) {
        self.readiness.wait();
    }

    fn slot_size(&self) -> u64 {
        slot::slot_size(self.config.block_size) as u64
    }

    /// One positioned write of a full slot under the file lock.
    fn write_slot(&self, offset: u64, payload: &[u8]) -> Result<(), StoreError> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(payload)?;
        file.flush()?;
        Ok(())
    }

    /// Positioned read of one payload under the file lock.
    fn read_payload(&self, offset: u64) -> Result<Vec<u8>, StoreError> {
        let mut payload = vec![0u8; self.config.block_size];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset + ID_LEN as u64))?;
        file.read_exact(&mut payload)?;
        Ok(payload)
    }

    /// Current length of the backing file in bytes.
    pub fn file_len(&self) -> Result<u64, StoreError> {
        Ok(self.file.lock().metadata()?.len())
    }
}

impl Filer for LocalFiler {
    fn id(&self) -> StoreId {
        self.id
    }

    fn get(&self, id: BlockId) -> Result<Option<Vec<u8>>, StoreError> {
        if id.is_nil() {
            return Err(StoreError::NilIdentifier);
        }
        self.wait_until_loaded();
        let start = Instant::now();

        let offset = match self.index.lock().offsets.get(&id) {
            Some(&offset) => offset,
            None => {
                debug!(%id, "[store] block not held on disk");
                return Ok(None);
            }
        };

        let payload = self.read_payload(offset)?;
        self.latency.record_since(start);
        Ok(Some(payload))
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
        self.wait_until_loaded();
        let start = Instant::now();
        let slot_size = self.slot_size();

        // Reserve a destination under the index lock: a freed slot when one
        // exists (the file does not grow), otherwise the logical end.
        let (offset, appended) = {
            let mut index = self.index.lock();
            if index.offsets.contains_key(&id) {
                warn!(%id, "[store] block already on disk; not storing");
                return Ok(());
            }
            let stored_bytes = (index.offsets.len() as u64 + 1) * slot_size;
            if stored_bytes > self.config.max_store_bytes {
                return Err(StoreError::StoreFull {
                    stored_bytes,
                    max_bytes: self.config.max_store_bytes,
                });
            }
            match index.free_slots.pop() {
                Some(offset) => (offset, false),
                None => {
                    let offset = index.end_offset;
                    index.end_offset += slot_size;
                    (offset, true)
                }
            }
        };

        let slot = slot::encode(id, data);
        if let Err(e) = self.write_slot(offset, &slot) {
            // Put the reserved slot back so a later save can claim it.
            error!(%id, offset, error = %e, "[store] slot write failed");
            self.index.lock().free_slots.push(offset);
            return Err(e);
        }

        {
            let mut index = self.index.lock();
            if index.offsets.contains_key(&id) {
                // Lost a duplicate-save race after the exists check; the
                // first writer wins, so zero our slot and hand it back.
                drop(index);
                warn!(%id, offset, "[store] concurrent duplicate save; discarding slot");
                let _ = self.write_slot(offset, &slot::zeroed(self.config.block_size));
                self.index.lock().free_slots.push(offset);
                return Ok(());
            }
            index.offsets.insert(id, offset);
        }
        self.latency.record_since(start);
        debug!(%id, offset, appended, "[store] block saved to disk");
        Ok(())
    }

    fn delete(&self, id: BlockId) -> Result<(), StoreError> {
        if id.is_nil() {
            return Err(StoreError::NilIdentifier);
        }
        self.wait_until_loaded();
        let start = Instant::now();

        let offset = match self.index.lock().offsets.get(&id) {
            Some(&offset) => offset,
            None => {
                warn!(%id, "[store] delete of block not in store");
                return Ok(());
            }
        };

        // Zero the whole slot; the file keeps its length (no compaction).
        self.write_slot(offset, &slot::zeroed(self.config.block_size))?;

        let mut index = self.index.lock();
        // A concurrent delete may have beaten us to the removal; only the
        // one that removed the entry frees the slot.
        if index.offsets.remove(&id).is_some() {
            index.free_slots.push(offset);
        }
        drop(index);

        self.latency.record_since(start);
        debug!(%id, offset, "[store] block deleted; slot freed");
        Ok(())
    }

    fn identifiers(&self) -> Vec<BlockId> {
        self.wait_until_loaded();
        self.index.lock().offsets.keys().copied().collect()
    }

    fn is_loaded(&self) -> bool {
        self.readiness.is_loaded()
    }

    fn avg_latency(&self) -> Duration {
        self.latency.average()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const BLOCK_SIZE: usize = 64;

    fn open_store(dir: &TempDir) -> Arc<LocalFiler> {
        let mut config = LocalStoreConfig::new(dir.path().join("storage.dat"));
        config.block_size = BLOCK_SIZE;
        config.max_store_bytes = 64 * slot::slot_size(BLOCK_SIZE) as u64;
        LocalFiler::open(config).unwrap()
    }

    fn block(fill: u8) -> Vec<u8> {
        vec![fill; BLOCK_SIZE]
    }

    #[test]
    fn test_save_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let id = BlockId::random();

        store.save(id, &block(0xAB)).unwrap();
        assert_eq!(store.get(id).unwrap(), Some(block(0xAB)));
    }

    #[test]
    fn test_get_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        assert_eq!(store.get(BlockId::random()).unwrap(), None);
    }

    #[test]
    fn test_nil_id_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        assert!(matches!(
            store.get(BlockId::nil()),
            Err(StoreError::NilIdentifier)
        ));
        assert!(matches!(
            store.save(BlockId::nil(), &block(0)),
            Err(StoreError::NilIdentifier)
        ));
        assert!(matches!(
            store.delete(BlockId::nil()),
            Err(StoreError::NilIdentifier)
        ));
    }

    #[test]
    fn test_wrong_length_save_does_not_mutate() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let id = BlockId::random();

        let result = store.save(id, &[1, 2, 3]);
        assert!(matches!(
            result,
            Err(StoreError::WrongBlockLength {
                expected: BLOCK_SIZE,
                got: 3
            })
        ));
        assert_eq!(store.get(id).unwrap(), None);
        assert_eq!(store.file_len().unwrap(), 0);
    }

    #[test]
    fn test_duplicate_save_keeps_first_write() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let id = BlockId::random();

        store.save(id, &block(0x11)).unwrap();
        store.save(id, &block(0x22)).unwrap();
        assert_eq!(store.get(id).unwrap(), Some(block(0x11)));
    }

    #[test]
    fn test_delete_then_get_is_none() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let id = BlockId::random();

        store.save(id, &block(0x33)).unwrap();
        store.delete(id).unwrap();
        assert_eq!(store.get(id).unwrap(), None);
    }

    #[test]
    fn test_delete_of_absent_id_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.delete(BlockId::random()).unwrap();
    }

    #[test]
    fn test_freed_slot_is_reused_without_growth() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let first = BlockId::random();

        store.save(first, &block(0x44)).unwrap();
        let len_before = store.file_len().unwrap();

        store.delete(first).unwrap();
        let replacement = BlockId::random();
        store.save(replacement, &block(0x55)).unwrap();

        assert_eq!(store.file_len().unwrap(), len_before);
        assert_eq!(store.get(replacement).unwrap(), Some(block(0x55)));
    }

    #[test]
    fn test_deleted_slot_survives_reload_as_free() {
        let dir = TempDir::new().unwrap();
        let keep = BlockId::random();
        let drop_id = BlockId::random();
        {
            let store = open_store(&dir);
            store.save(keep, &block(0x66)).unwrap();
            store.save(drop_id, &block(0x77)).unwrap();
            store.delete(drop_id).unwrap();
        }

        let reopened = open_store(&dir);
        assert_eq!(reopened.get(keep).unwrap(), Some(block(0x66)));
        assert_eq!(reopened.get(drop_id).unwrap(), None);

        // The freed slot is found by the scan and reused.
        let len_before = reopened.file_len().unwrap();
        reopened.save(BlockId::random(), &block(0x88)).unwrap();
        assert_eq!(reopened.file_len().unwrap(), len_before);
    }

    #[test]
    fn test_store_full_rejects_save() {
        let dir = TempDir::new().unwrap();
        let mut config = LocalStoreConfig::new(dir.path().join("storage.dat"));
        config.block_size = BLOCK_SIZE;
        config.max_store_bytes = 2 * slot::slot_size(BLOCK_SIZE) as u64;
        let store = LocalFiler::open(config).unwrap();

        store.save(BlockId::random(), &block(1)).unwrap();
        store.save(BlockId::random(), &block(2)).unwrap();
        assert!(matches!(
            store.save(BlockId::random(), &block(3)),
            Err(StoreError::StoreFull { .. })
        ));
    }

    #[test]
    fn test_identifiers_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let a = BlockId::random();
        let b = BlockId::random();

        store.save(a, &block(1)).unwrap();
        store.save(b, &block(2)).unwrap();

        let mut ids = store.identifiers();
        ids.sort_by_key(|id| id.to_bytes());
        let mut expected = vec![a, b];
        expected.sort_by_key(|id| id.to_bytes());
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_reload_restores_index() {
        let dir = TempDir::new().unwrap();
        let id = BlockId::random();
        {
            let store = open_store(&dir);
            store.save(id, &block(0x99)).unwrap();
        }
        let reopened = open_store(&dir);
        assert_eq!(reopened.get(id).unwrap(), Some(block(0x99)));
    }
}

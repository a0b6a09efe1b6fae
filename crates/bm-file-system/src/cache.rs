//! # Retrieved-File Cache
//!
//! Holds the reassembled payloads of files currently in use, one entry per
//! logical file keyed by manifest id. Storing a newer version replaces the
//! entry and emits a [`CacheActivity`] so observers can see turnover.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use uuid::Uuid;

/// What was evicted by a cache replacement.
#[derive(Debug, Clone)]
pub struct CacheActivity {
    /// Manifest id of the replaced file.
    pub file_id: Uuid,
    /// Version that was resident until now.
    pub version_id: Uuid,
    /// How long the evicted entry sat in the cache.
    pub time_in_cache: Duration,
}

struct Entry {
    version_id: Uuid,
    data: Vec<u8>,
    created: Instant,
}

/// Plaintext cache of retrieved files.
pub struct FileCache {
    entries: Mutex<HashMap<Uuid, Entry>>,
    replacements: broadcast::Sender<CacheActivity>,
}

impl FileCache {
    pub fn new() -> Self {
        let (replacements, _) = broadcast::channel(64);
        Self {
            entries: Mutex::new(HashMap::new()),
            replacements,
        }
    }

    /// Cached payload for `file_id`, only when the resident entry is of
    /// `version_id` — an older version is never served.
    pub fn get(&self, file_id: Uuid, version_id: Uuid) -> Option<Vec<u8>> {
        let entries = self.entries.lock();
        entries
            .get(&file_id)
            .filter(|e| e.version_id == version_id)
            .map(|e| e.data.clone())
    }

    /// Insert a payload, replacing any resident entry for the file. A
    /// replacement emits [`CacheActivity`] for the evicted version.
    pub fn put(&self, file_id: Uuid, version_id: Uuid, data: Vec<u8>) {
        let entry = Entry {
            version_id,
            data,
            created: Instant::now(),
        };

        let old = self.entries.lock().insert(file_id, entry);
        if let Some(old) = old {
            let _ = self.replacements.send(CacheActivity {
                file_id,
                version_id: old.version_id,
                time_in_cache: old.created.elapsed(),
            });
        }
    }

    /// Subscribe to replacement activity.
    pub fn subscribe_replacements(&self) -> broadcast::Receiver<CacheActivity> {
        self.replacements.subscribe()
    }
}

impl Default for FileCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_requires_matching_version() {
        let cache = FileCache::new();
        let file = Uuid::new_v4();
        let version = Uuid::new_v4();
        cache.put(file, version, vec![1, 2, 3]);

        assert_eq!(cache.get(file, version), Some(vec![1, 2, 3]));
        assert_eq!(cache.get(file, Uuid::new_v4()), None);
        assert_eq!(cache.get(Uuid::new_v4(), version), None);
    }

    #[test]
    fn test_replacement_fires_activity() {
        let cache = FileCache::new();
        let mut activity = cache.subscribe_replacements();

        let file = Uuid::new_v4();
        let old_version = Uuid::new_v4();
        cache.put(file, old_version, vec![1]);
        cache.put(file, Uuid::new_v4(), vec![2]);

        let event = activity.try_recv().unwrap();
        assert_eq!(event.file_id, file);
        assert_eq!(event.version_id, old_version);
    }

    #[test]
    fn test_first_insert_is_silent() {
        let cache = FileCache::new();
        let mut activity = cache.subscribe_replacements();
        cache.put(Uuid::new_v4(), Uuid::new_v4(), vec![1]);
        assert!(activity.try_recv().is_err());
    }
}

//! In-process key-value store
//!
//! Models the log-backed semantics of a JetStream bucket: one sequence per
//! bucket, revisions are sequence numbers, deletes and purges are markers,
//! history depth and max age bound what is retained.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tracing::trace;

use crate::domain::{BucketConfig, BucketStatus, Entry, Operation};
use crate::infrastructure::traits::{KvStore, StoreError, StoreResult};

#[derive(Debug)]
struct MemBucket {
    config: BucketConfig,
    last_seq: u64,
    /// Ordered by revision
    log: Vec<Entry>,
}

impl MemBucket {
    fn new(config: BucketConfig) -> Self {
        Self {
            config,
            last_seq: 0,
            log: Vec::new(),
        }
    }

    fn expire(&mut self) {
        if self.config.max_age.is_zero() {
            return;
        }
        let Ok(max_age) = chrono::Duration::from_std(self.config.max_age) else {
            return;
        };
        let cutoff = Utc::now() - max_age;
        self.log.retain(|e| e.created > cutoff);
    }

    fn latest(&self, key: &str) -> Option<&Entry> {
        self.log.iter().rev().find(|e| e.key == key)
    }

    fn append(&mut self, key: &str, value: &[u8], operation: Operation) -> StoreResult<u64> {
        if self.config.max_value_size >= 0 && value.len() > self.config.max_value_size as usize {
            return Err(StoreError::backend(
                format!("put {} > {}", self.config.bucket, key),
                "message size exceeds maximum allowed",
            ));
        }

        self.last_seq += 1;
        let revision = self.last_seq;
        if operation == Operation::Purge {
            self.log.retain(|e| e.key != key);
        }
        self.log.push(Entry {
            bucket: self.config.bucket.clone(),
            key: key.to_string(),
            value: value.to_vec(),
            revision,
            delta: 0,
            created: Utc::now(),
            operation,
        });

        let retained = self.log.iter().filter(|e| e.key == key).count();
        let history = usize::try_from(self.config.history.max(1)).unwrap_or(1);
        if retained > history {
            let mut excess = retained - history;
            self.log.retain(|e| {
                if excess > 0 && e.key == key {
                    excess -= 1;
                    false
                } else {
                    true
                }
            });
        }
        Ok(revision)
    }

    fn with_delta(&self, entry: &Entry) -> Entry {
        let mut entry = entry.clone();
        entry.delta = self.last_seq - entry.revision;
        entry
    }

    fn status(&self) -> BucketStatus {
        BucketStatus {
            bucket: self.config.bucket.clone(),
            values: self.log.len() as u64,
            history: self.config.history,
            max_age: self.config.max_age,
            max_value_size: self.config.max_value_size,
            bytes: self.log.iter().map(|e| e.value.len() as u64).sum(),
        }
    }
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: Mutex<HashMap<String, MemBucket>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<String, MemBucket>>> {
        self.buckets
            .lock()
            .map_err(|_| StoreError::backend("memory store", "lock poisoned"))
    }

    /// Run `f` against an existing bucket after dropping expired entries.
    fn with_bucket<T>(
        &self,
        bucket: &str,
        f: impl FnOnce(&mut MemBucket) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut buckets = self.lock()?;
        let b = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        b.expire();
        f(b)
    }
}

impl KvStore for MemoryStore {
    fn create_bucket(&self, config: &BucketConfig) -> StoreResult<BucketStatus> {
        trace!("memory: create bucket {}", config.bucket);
        let mut buckets = self.lock()?;
        if let Some(existing) = buckets.get(&config.bucket) {
            if existing.config == *config {
                return Ok(existing.status());
            }
            return Err(StoreError::BucketExists(config.bucket.clone()));
        }
        let bucket = MemBucket::new(config.clone());
        let status = bucket.status();
        buckets.insert(config.bucket.clone(), bucket);
        Ok(status)
    }

    fn delete_bucket(&self, bucket: &str) -> StoreResult<()> {
        trace!("memory: delete bucket {}", bucket);
        self.lock()?
            .remove(bucket)
            .map(|_| ())
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))
    }

    fn bucket_status(&self, bucket: &str) -> StoreResult<BucketStatus> {
        self.with_bucket(bucket, |b| Ok(b.status()))
    }

    fn bucket_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn entry(&self, bucket: &str, key: &str) -> StoreResult<Option<Entry>> {
        self.with_bucket(bucket, |b| Ok(b.latest(key).map(|e| b.with_delta(e))))
    }

    fn put(&self, bucket: &str, key: &str, value: &[u8]) -> StoreResult<u64> {
        trace!("memory: put {} > {}", bucket, key);
        self.with_bucket(bucket, |b| b.append(key, value, Operation::Put))
    }

    fn create(&self, bucket: &str, key: &str, value: &[u8]) -> StoreResult<u64> {
        trace!("memory: create {} > {}", bucket, key);
        self.with_bucket(bucket, |b| {
            if b.latest(key).is_some_and(Entry::is_live) {
                return Err(StoreError::KeyExists(key.to_string()));
            }
            b.append(key, value, Operation::Put)
        })
    }

    fn update(&self, bucket: &str, key: &str, value: &[u8], revision: u64) -> StoreResult<u64> {
        trace!("memory: update {} > {} @ {}", bucket, key, revision);
        self.with_bucket(bucket, |b| {
            let current = b.latest(key).map(|e| e.revision);
            // Revision 0 expects the key to have no message at all.
            let matches = match current {
                Some(rev) => rev == revision,
                None => revision == 0,
            };
            if !matches {
                return Err(StoreError::WrongRevision {
                    key: key.to_string(),
                    expected: revision,
                    current,
                });
            }
            b.append(key, value, Operation::Put)
        })
    }

    fn delete(&self, bucket: &str, key: &str) -> StoreResult<()> {
        trace!("memory: delete {} > {}", bucket, key);
        self.with_bucket(bucket, |b| b.append(key, &[], Operation::Delete).map(|_| ()))
    }

    fn purge(&self, bucket: &str, key: &str) -> StoreResult<()> {
        trace!("memory: purge {} > {}", bucket, key);
        self.with_bucket(bucket, |b| b.append(key, &[], Operation::Purge).map(|_| ()))
    }

    fn history(&self, bucket: &str, key: &str) -> StoreResult<Vec<Entry>> {
        self.with_bucket(bucket, |b| {
            Ok(b.log
                .iter()
                .filter(|e| e.key == key)
                .map(|e| b.with_delta(e))
                .collect())
        })
    }

    fn keys(&self, bucket: &str) -> StoreResult<Vec<String>> {
        self.with_bucket(bucket, |b| {
            let mut latest: BTreeMap<&str, &Entry> = BTreeMap::new();
            for e in &b.log {
                latest.insert(e.key.as_str(), e);
            }
            Ok(latest
                .into_iter()
                .filter(|(_, e)| e.is_live())
                .map(|(k, _)| k.to_string())
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_bucket(history: i64) -> MemoryStore {
        let store = MemoryStore::new();
        let mut cfg = BucketConfig::new("T");
        cfg.history = history;
        store.create_bucket(&cfg).unwrap();
        store
    }

    #[test]
    fn given_writes_to_different_keys_when_putting_then_revisions_follow_bucket_sequence() {
        let store = store_with_bucket(1);
        assert_eq!(store.put("T", "X", b"1").unwrap(), 1);
        assert_eq!(store.put("T", "Y", b"2").unwrap(), 2);
        assert_eq!(store.put("T", "X", b"3").unwrap(), 3);
    }

    #[test]
    fn given_history_depth_when_writing_more_revisions_then_oldest_are_dropped() {
        let store = store_with_bucket(3);
        for i in 0..5 {
            store.put("T", "X", format!("v{i}").as_bytes()).unwrap();
        }

        let history = store.history("T", "X").unwrap();
        let values: Vec<_> = history.iter().map(|e| e.value.clone()).collect();
        assert_eq!(values, vec![b"v2".to_vec(), b"v3".to_vec(), b"v4".to_vec()]);
    }

    #[test]
    fn given_purged_key_when_reading_history_then_only_marker_remains() {
        let store = store_with_bucket(10);
        store.put("T", "X", b"a").unwrap();
        store.put("T", "X", b"b").unwrap();
        store.purge("T", "X").unwrap();

        let history = store.history("T", "X").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].operation, Operation::Purge);
    }

    #[test]
    fn given_deleted_key_when_listing_keys_then_key_is_hidden() {
        let store = store_with_bucket(1);
        store.put("T", "X", b"a").unwrap();
        store.put("T", "Y", b"b").unwrap();
        store.delete("T", "X").unwrap();

        assert_eq!(store.keys("T").unwrap(), vec!["Y".to_string()]);
    }

    #[test]
    fn given_max_value_size_when_putting_larger_value_then_rejected() {
        let store = MemoryStore::new();
        let mut cfg = BucketConfig::new("T");
        cfg.max_value_size = 2;
        store.create_bucket(&cfg).unwrap();

        assert!(store.put("T", "X", b"ok").is_ok());
        assert!(store.put("T", "X", b"too big").is_err());
    }

    #[test]
    fn given_max_age_when_entries_are_older_then_they_expire() {
        // Arrange
        let store = MemoryStore::new();
        let mut cfg = BucketConfig::new("T");
        cfg.max_age = std::time::Duration::from_millis(1);
        store.create_bucket(&cfg).unwrap();
        store.put("T", "X", b"v").unwrap();

        // Act
        std::thread::sleep(std::time::Duration::from_millis(20));

        // Assert
        assert_eq!(store.entry("T", "X").unwrap(), None);
        assert!(store.keys("T").unwrap().is_empty());
        assert_eq!(store.bucket_status("T").unwrap().values, 0);
    }

    #[test]
    fn given_max_age_when_entries_are_fresh_then_they_are_kept() {
        let store = MemoryStore::new();
        let mut cfg = BucketConfig::new("T");
        cfg.max_age = std::time::Duration::from_secs(3600);
        store.create_bucket(&cfg).unwrap();
        store.put("T", "X", b"v").unwrap();

        assert!(store.entry("T", "X").unwrap().is_some());
    }

    #[test]
    fn given_existing_bucket_when_recreating_with_other_config_then_bucket_exists() {
        let store = store_with_bucket(1);
        let mut cfg = BucketConfig::new("T");
        cfg.history = 5;

        assert!(matches!(
            store.create_bucket(&cfg),
            Err(StoreError::BucketExists(_))
        ));
        assert!(store.create_bucket(&BucketConfig::new("T")).is_ok());
    }
}

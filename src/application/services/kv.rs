//! Key-value service
//!
//! One method per bucket or key operation. Validates names, calls the store
//! and turns store outcomes into application errors.

use std::sync::Arc;

use tracing::{debug, info};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{
    validate_bucket, validate_history, validate_key, BucketConfig, BucketStatus, DomainError,
    Entry,
};
use crate::infrastructure::traits::{KvStore, StoreError};

/// Service for bucket-scoped key-value operations.
pub struct KvService {
    store: Arc<dyn KvStore>,
}

impl KvService {
    /// Create a new key-value service.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Current live entry of a key.
    ///
    /// Tombstoned and never-written keys are both `KeyNotFound`.
    pub fn get(&self, bucket: &str, key: &str) -> ApplicationResult<Entry> {
        debug!("get: bucket={}, key={}", bucket, key);
        validate_target(bucket, key)?;

        match self
            .store
            .entry(bucket, key)
            .map_err(|e| map_store_err(e, bucket, Some(key)))?
        {
            Some(entry) if entry.is_live() => Ok(entry),
            _ => Err(not_found(bucket, key)),
        }
    }

    /// Unconditional write. Returns the new revision.
    pub fn put(&self, bucket: &str, key: &str, value: &[u8]) -> ApplicationResult<u64> {
        debug!("put: bucket={}, key={}, len={}", bucket, key, value.len());
        validate_target(bucket, key)?;

        let revision = self
            .store
            .put(bucket, key, value)
            .map_err(|e| map_store_err(e, bucket, Some(key)))?;
        info!("put: {} > {} revision {}", bucket, key, revision);
        Ok(revision)
    }

    /// Write only if the key has no live entry. Returns the new revision.
    pub fn create(&self, bucket: &str, key: &str, value: &[u8]) -> ApplicationResult<u64> {
        debug!("create: bucket={}, key={}, len={}", bucket, key, value.len());
        validate_target(bucket, key)?;

        let revision = self
            .store
            .create(bucket, key, value)
            .map_err(|e| map_store_err(e, bucket, Some(key)))?;
        info!("create: {} > {} revision {}", bucket, key, revision);
        Ok(revision)
    }

    /// Write only if the key's current revision is `expected`. Returns the new revision.
    pub fn update(
        &self,
        bucket: &str,
        key: &str,
        value: &[u8],
        expected: u64,
    ) -> ApplicationResult<u64> {
        debug!(
            "update: bucket={}, key={}, len={}, expected={}",
            bucket,
            key,
            value.len(),
            expected
        );
        validate_target(bucket, key)?;

        let revision = self
            .store
            .update(bucket, key, value, expected)
            .map_err(|e| map_store_err(e, bucket, Some(key)))?;
        info!("update: {} > {} revision {}", bucket, key, revision);
        Ok(revision)
    }

    /// Tombstone a key, keeping its history.
    ///
    /// Deleting an already deleted key succeeds; a key that was never written is `KeyNotFound`.
    pub fn delete(&self, bucket: &str, key: &str) -> ApplicationResult<()> {
        debug!("delete: bucket={}, key={}", bucket, key);
        validate_target(bucket, key)?;

        let latest = self
            .store
            .entry(bucket, key)
            .map_err(|e| map_store_err(e, bucket, Some(key)))?;
        if latest.is_none() {
            return Err(not_found(bucket, key));
        }

        self.store
            .delete(bucket, key)
            .map_err(|e| map_store_err(e, bucket, Some(key)))?;
        info!("delete: {} > {}", bucket, key);
        Ok(())
    }

    /// Tombstone a key and discard its earlier revisions. Other keys are untouched.
    pub fn purge(&self, bucket: &str, key: &str) -> ApplicationResult<()> {
        debug!("purge: bucket={}, key={}", bucket, key);
        validate_target(bucket, key)?;

        self.store
            .purge(bucket, key)
            .map_err(|e| map_store_err(e, bucket, Some(key)))?;
        info!("purge: {} > {}", bucket, key);
        Ok(())
    }

    /// Every retained revision of a key, oldest first.
    pub fn history(&self, bucket: &str, key: &str) -> ApplicationResult<Vec<Entry>> {
        debug!("history: bucket={}, key={}", bucket, key);
        validate_target(bucket, key)?;

        // Never-written keys are answered without opening a history watcher.
        let latest = self
            .store
            .entry(bucket, key)
            .map_err(|e| map_store_err(e, bucket, Some(key)))?;
        if latest.is_none() {
            return Err(not_found(bucket, key));
        }

        let mut entries = self
            .store
            .history(bucket, key)
            .map_err(|e| map_store_err(e, bucket, Some(key)))?;
        entries.sort_by_key(|e| e.revision);
        Ok(entries)
    }

    /// Keys with a live entry, sorted.
    pub fn keys(&self, bucket: &str) -> ApplicationResult<Vec<String>> {
        debug!("keys: bucket={}", bucket);
        validate_bucket(bucket)?;

        let mut keys = self
            .store
            .keys(bucket)
            .map_err(|e| map_store_err(e, bucket, None))?;
        keys.sort();
        Ok(keys)
    }

    /// Create a bucket. An existing bucket is handled by the store's policy.
    pub fn add_bucket(&self, config: &BucketConfig) -> ApplicationResult<BucketStatus> {
        debug!(
            "add_bucket: bucket={}, history={}, max_age={:?}",
            config.bucket, config.history, config.max_age
        );
        validate_bucket_config(config)?;

        let status = self
            .store
            .create_bucket(config)
            .map_err(|e| map_store_err(e, &config.bucket, None))?;
        info!("add_bucket: created {}", config.bucket);
        Ok(status)
    }

    /// Delete a bucket and all of its entries.
    pub fn remove_bucket(&self, bucket: &str) -> ApplicationResult<()> {
        debug!("remove_bucket: bucket={}", bucket);
        validate_bucket(bucket)?;

        self.store
            .delete_bucket(bucket)
            .map_err(|e| map_store_err(e, bucket, None))?;
        info!("remove_bucket: deleted {}", bucket);
        Ok(())
    }

    /// Status of a bucket.
    pub fn status(&self, bucket: &str) -> ApplicationResult<BucketStatus> {
        debug!("status: bucket={}", bucket);
        validate_bucket(bucket)?;

        self.store
            .bucket_status(bucket)
            .map_err(|e| map_store_err(e, bucket, None))
    }

    /// All bucket names, sorted.
    pub fn list_buckets(&self) -> ApplicationResult<Vec<String>> {
        debug!("list_buckets");
        let mut names = self
            .store
            .bucket_names()
            .map_err(|e| map_store_err(e, "", None))?;
        names.sort();
        Ok(names)
    }
}

/// Validate a bucket and key pair.
pub(crate) fn validate_target(bucket: &str, key: &str) -> Result<(), DomainError> {
    validate_bucket(bucket)?;
    validate_key(key)
}

/// Validate everything in a bucket config that the store would otherwise reject remotely.
pub(crate) fn validate_bucket_config(config: &BucketConfig) -> Result<(), DomainError> {
    validate_bucket(&config.bucket)?;
    validate_history(config.history)?;
    if !(1..=5).contains(&config.replicas) {
        return Err(DomainError::InvalidReplicas(config.replicas));
    }
    Ok(())
}

fn not_found(bucket: &str, key: &str) -> ApplicationError {
    ApplicationError::KeyNotFound {
        bucket: bucket.to_string(),
        key: key.to_string(),
    }
}

fn map_store_err(err: StoreError, bucket: &str, key: Option<&str>) -> ApplicationError {
    match err {
        StoreError::BucketNotFound(b) => ApplicationError::BucketNotFound(b),
        StoreError::BucketExists(b) => ApplicationError::BucketExists(b),
        StoreError::KeyExists(k) => ApplicationError::KeyExists {
            bucket: bucket.to_string(),
            key: k,
        },
        StoreError::WrongRevision {
            key,
            expected,
            current,
        } => ApplicationError::RevisionMismatch {
            key,
            expected,
            current,
        },
        StoreError::Timeout(what) => ApplicationError::Unavailable {
            message: format!("{what} timed out"),
        },
        e @ StoreError::Backend { .. } => {
            let context = match key {
                Some(key) => format!("{bucket} > {key}"),
                None if bucket.is_empty() => "store".to_string(),
                None => bucket.to_string(),
            };
            ApplicationError::OperationFailed {
                context,
                source: Box::new(e),
            }
        }
    }
}

//! Domain entities: core data structures

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Maximum number of revisions a bucket may retain per key.
pub const MAX_HISTORY: i64 = 64;

/// Prefix of the stream backing a bucket.
pub const STREAM_PREFIX: &str = "KV_";

/// Kind of write recorded for a revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Put,
    /// Tombstone, earlier revisions kept
    Delete,
    /// Tombstone, earlier revisions discarded
    Purge,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Put => "PUT",
            Operation::Delete => "DEL",
            Operation::Purge => "PURGE",
        };
        f.write_str(s)
    }
}

/// One revision of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub bucket: String,
    pub key: String,
    pub value: Vec<u8>,
    /// Store-assigned, strictly increasing
    pub revision: u64,
    /// Number of newer messages in the bucket when this entry was read
    pub delta: u64,
    pub created: DateTime<Utc>,
    pub operation: Operation,
}

impl Entry {
    /// True unless the entry is a delete or purge marker.
    pub fn is_live(&self) -> bool {
        self.operation == Operation::Put
    }
}

/// Settings a bucket is created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketConfig {
    pub bucket: String,
    pub description: String,
    /// Revisions retained per key
    pub history: i64,
    /// Zero means entries never expire
    pub max_age: Duration,
    /// -1 means unlimited
    pub max_value_size: i32,
    /// -1 means unlimited
    pub max_bytes: i64,
    pub replicas: usize,
}

impl BucketConfig {
    /// Config with store defaults for the given bucket name.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            description: String::new(),
            history: 1,
            max_age: Duration::ZERO,
            max_value_size: -1,
            max_bytes: -1,
            replicas: 1,
        }
    }

    /// Name of the stream backing this bucket.
    pub fn stream_name(&self) -> String {
        format!("{}{}", STREAM_PREFIX, self.bucket)
    }
}

/// Runtime state of a bucket as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketStatus {
    pub bucket: String,
    /// Messages held, tombstones and old revisions included
    pub values: u64,
    pub history: i64,
    pub max_age: Duration,
    pub max_value_size: i32,
    pub bytes: u64,
}

/// Expand `~`, `$VAR` and `${VAR}` in a path-like string.
///
/// Falls back to the input unchanged if expansion fails (e.g. unset variable).
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_default_config_when_created_then_uses_store_defaults() {
        let cfg = BucketConfig::new("T");
        assert_eq!(cfg.history, 1);
        assert_eq!(cfg.max_age, Duration::ZERO);
        assert_eq!(cfg.max_value_size, -1);
        assert_eq!(cfg.stream_name(), "KV_T");
    }

    #[test]
    fn given_tombstone_when_checking_liveness_then_not_live() {
        let entry = Entry {
            bucket: "T".into(),
            key: "X".into(),
            value: vec![],
            revision: 2,
            delta: 0,
            created: Utc::now(),
            operation: Operation::Delete,
        };
        assert!(!entry.is_live());
        assert_eq!(entry.operation.to_string(), "DEL");
    }
}

//! I/O boundary traits for testability
//!
//! These traits abstract the key-value store and the interactive terminal,
//! allowing services to be tested with in-process implementations.

use std::io;

use thiserror::Error;

use crate::domain::{BucketConfig, BucketStatus, Entry};

/// Failures reported by a `KvStore` implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    #[error("bucket exists with a different configuration: {0}")]
    BucketExists(String),

    #[error("key exists: {0}")]
    KeyExists(String),

    #[error("wrong last revision for {key}: expected {expected}")]
    WrongRevision {
        key: String,
        expected: u64,
        current: Option<u64>,
    },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("{context}")]
    Backend {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    /// Wrap a client library error with what was being attempted.
    pub fn backend(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Backend {
            context: context.into(),
            source: source.into(),
        }
    }
}

/// Result type for store calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// Bucket-scoped key-value operations over a streaming log.
///
/// Every call is synchronous from the caller's side; async clients block internally.
pub trait KvStore: Send + Sync {
    /// Create a bucket, or return the existing one if its config matches.
    fn create_bucket(&self, config: &BucketConfig) -> StoreResult<BucketStatus>;

    /// Delete a bucket and every entry in it.
    fn delete_bucket(&self, bucket: &str) -> StoreResult<()>;

    /// Current status of a bucket.
    fn bucket_status(&self, bucket: &str) -> StoreResult<BucketStatus>;

    /// Names of all buckets, unordered.
    fn bucket_names(&self) -> StoreResult<Vec<String>>;

    /// Latest entry for a key, tombstones included. `None` if the key was never written
    /// (or its history has expired).
    fn entry(&self, bucket: &str, key: &str) -> StoreResult<Option<Entry>>;

    /// Unconditional write, returns the new revision.
    fn put(&self, bucket: &str, key: &str, value: &[u8]) -> StoreResult<u64>;

    /// Write only if the key has no live entry.
    fn create(&self, bucket: &str, key: &str, value: &[u8]) -> StoreResult<u64>;

    /// Write only if the key's latest revision equals `revision`.
    fn update(&self, bucket: &str, key: &str, value: &[u8], revision: u64) -> StoreResult<u64>;

    /// Append a delete marker.
    fn delete(&self, bucket: &str, key: &str) -> StoreResult<()>;

    /// Append a purge marker and discard earlier revisions of the key.
    fn purge(&self, bucket: &str, key: &str) -> StoreResult<()>;

    /// Retained revisions of a key, oldest first.
    fn history(&self, bucket: &str, key: &str) -> StoreResult<Vec<Entry>>;

    /// Keys with a live entry, unordered.
    fn keys(&self, bucket: &str) -> StoreResult<Vec<String>>;
}

/// Interactive yes/no confirmation.
pub trait Prompter: Send + Sync {
    /// Ask the user to confirm. Anything but an explicit yes is a no.
    fn confirm(&self, question: &str) -> io::Result<bool>;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Prompter reading the answer from stdin.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&self, question: &str) -> io::Result<bool> {
        crate::cli::output::prompt(&format!("{question} [y/N]"));
        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        Ok(is_yes(&answer))
    }
}

/// Prompter with a fixed answer, for `--force` style and non-interactive use.
#[derive(Debug, Clone, Copy)]
pub struct FixedPrompter(pub bool);

impl Prompter for FixedPrompter {
    fn confirm(&self, _question: &str) -> io::Result<bool> {
        Ok(self.0)
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("y\n", true)]
    #[case("YES\n", true)]
    #[case(" yes ", true)]
    #[case("\n", false)]
    #[case("n\n", false)]
    #[case("yep\n", false)]
    fn given_answer_when_parsing_confirmation_then_only_yes_confirms(
        #[case] answer: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(is_yes(answer), expected);
    }
}

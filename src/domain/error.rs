//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent invalid input caught before any store call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid bucket name: {0:?}")]
    InvalidBucketName(String),

    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    #[error("invalid duration {input:?}: {reason}")]
    InvalidDuration { input: String, reason: String },

    #[error("history must be between 1 and {max}, got {value}")]
    InvalidHistory { value: i64, max: i64 },

    #[error("replicas must be between 1 and 5, got {0}")]
    InvalidReplicas(usize),
}

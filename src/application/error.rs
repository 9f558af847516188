//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::domain::DomainError;

/// Application errors wrap domain errors and add the store outcome taxonomy.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("key not found: {bucket} > {key}")]
    KeyNotFound { bucket: String, key: String },

    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    #[error("key already exists: {bucket} > {key}")]
    KeyExists { bucket: String, key: String },

    #[error("bucket already exists with a different configuration: {0}")]
    BucketExists(String),

    #[error("wrong last revision for {key}: expected {expected}, current {}", display_revision(*.current))]
    RevisionMismatch {
        key: String,
        expected: u64,
        current: Option<u64>,
    },

    #[error("server unavailable: {message}")]
    Unavailable { message: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

fn display_revision(rev: Option<u64>) -> String {
    rev.map(|r| r.to_string()).unwrap_or_else(|| "none".to_string())
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;

//! Bucket and key name rules
//!
//! Names are checked locally so malformed arguments never reach the network.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::entities::MAX_HISTORY;
use crate::domain::DomainError;

fn bucket_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("static regex"))
}

fn key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[-/_=\.a-zA-Z0-9]+$").expect("static regex"))
}

/// Check a bucket name: letters, digits, `_` and `-` only.
pub fn validate_bucket(bucket: &str) -> Result<(), DomainError> {
    if bucket_re().is_match(bucket) {
        Ok(())
    } else {
        Err(DomainError::InvalidBucketName(bucket.to_string()))
    }
}

/// Check a key: letters, digits and `-/_=.`, no leading or trailing `.`.
pub fn validate_key(key: &str) -> Result<(), DomainError> {
    if key.starts_with('.') || key.ends_with('.') || !key_re().is_match(key) {
        return Err(DomainError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Check a per-key history depth.
pub fn validate_history(history: i64) -> Result<(), DomainError> {
    if (1..=MAX_HISTORY).contains(&history) {
        Ok(())
    } else {
        Err(DomainError::InvalidHistory {
            value: history,
            max: MAX_HISTORY,
        })
    }
}

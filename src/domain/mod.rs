//! Domain layer: entities and validation rules
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod duration;
pub mod entities;
pub mod error;
pub mod validation;

pub use duration::{format_duration, parse_duration};
pub use entities::*;
pub use error::DomainError;
pub use validation::{validate_bucket, validate_history, validate_key};

//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (KvStore, Prompter)
//! but are themselves concrete structs, not traits.

mod kv;

pub use kv::KvService;
pub(crate) use kv::{validate_bucket_config, validate_target};

//! Infrastructure layer: store implementations and DI container
//!
//! This layer implements I/O boundary traits and wires up services.

pub mod di;
pub mod error;
pub mod memory;
pub mod nats;
pub mod traits;

pub use error::{InfraError, InfraResult};

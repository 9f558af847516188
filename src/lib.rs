//! natskv: command line access to NATS JetStream key-value buckets
//!
//! Layers, outermost first: `cli` parses and renders, `infrastructure`
//! talks to the server (or an in-memory store), `application` holds the
//! key-value service, `domain` the entities and name rules.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;

//! Durable, consumer-group-based `Backend` implementation over Redis Streams.
//!
//! Where `spine_runtime::in_memory_backend::InMemoryBackend` loses everything on process
//! restart, [`StreamsBackend`] survives it: events live in a Redis stream, delivery is tracked
//! by a consumer group, and a message left unacknowledged past `claim_min_idle` is reclaimed by
//! `XCLAIM` and redelivered (or, past `max_retries` attempts, routed to a dead-letter stream).

#![warn(missing_docs)]

pub mod backend;
pub mod config;
pub mod error;
mod url_mask;

pub use backend::{StreamHealth, StreamsBackend, StreamsMetricsSnapshot};
pub use config::{StreamsBackendConfig, StreamsBackendConfigBuilder};
pub use error::StreamsError;

//! Errors surfaced by [`crate::backend::StreamsBackend`].
//!
//! Grounded on `examples/Ahmadnoorkhan1-forgeerp/crates/infra/src/event_bus/redis_streams.rs`'s
//! `RedisStreamsError` taxonomy (Connection/Command/Serialization/Deserialization/ConsumerGroup),
//! narrowed to what `SPEC_FULL.md` §4.5/§7 actually distinguishes.

use thiserror::Error;

/// Errors internal to the streams backend, before they are folded into
/// [`spine_core::backend::BackendError`] at the `Backend` trait boundary.
#[derive(Error, Debug)]
pub enum StreamsError {
    /// Failed to open or re-establish the Redis connection.
    #[error("redis connection error: {0}")]
    Connection(String),

    /// A Redis command (`XADD`, `XREADGROUP`, `XACK`, `XPENDING`, `XCLAIM`, `XGROUP`,
    /// `XINFO STREAM`) failed.
    #[error("redis command error: {0}")]
    Command(String),

    /// An event could not be serialized to the stream's JSON wire format.
    #[error("event serialization error: {0}")]
    Serialization(String),

    /// A stream entry could not be deserialized back into an `Event`.
    #[error("event deserialization error: {0}")]
    Deserialization(String),
}

impl From<redis::RedisError> for StreamsError {
    fn from(err: redis::RedisError) -> Self {
        Self::Command(err.to_string())
    }
}

//! `StreamsBackendConfig`: the durable backend's tunables (`SPEC_FULL.md` §4.5, §6).
//!
//! Follows `spine-runtime`'s `SpineConfig` builder convention: a `Default` carrying the spec's
//! defaults, plus a fluent builder for overriding a subset of fields.

use std::time::Duration;

/// Configuration for one [`crate::backend::StreamsBackend`] instance.
#[derive(Debug, Clone)]
pub struct StreamsBackendConfig {
    /// The Redis stream key events are appended to.
    pub stream_key: String,
    /// The consumer group name. All consumers sharing this group split the stream's work.
    pub consumer_group: String,
    /// This process's consumer name within `consumer_group`. Must be unique per consumer.
    pub consumer_name: String,
    /// Size of the underlying Redis connection pool (`ConnectionManager` clones are cheap;
    /// this bounds how many concurrent commands may be in flight).
    pub pool_size: usize,
    /// Delivery attempts (via `XCLAIM`) before a pending message is routed to the DLQ stream.
    pub max_retries: u32,
    /// Minimum time a message may sit unacknowledged before it is eligible for reclaim.
    pub claim_min_idle: Duration,
    /// The dead-letter stream key. Defaults to `{stream_key}:dlq`.
    pub dlq_stream: Option<String>,
}

impl StreamsBackendConfig {
    /// Start building a config for `stream_key`/`consumer_group`/`consumer_name`, with the
    /// spec's defaults for everything else.
    #[must_use]
    pub fn builder(
        stream_key: impl Into<String>,
        consumer_group: impl Into<String>,
        consumer_name: impl Into<String>,
    ) -> StreamsBackendConfigBuilder {
        StreamsBackendConfigBuilder(Self {
            stream_key: stream_key.into(),
            consumer_group: consumer_group.into(),
            consumer_name: consumer_name.into(),
            pool_size: 4,
            max_retries: 5,
            claim_min_idle: Duration::from_secs(30),
            dlq_stream: None,
        })
    }

    /// The dead-letter stream key: `dlq_stream` if set, else `{stream_key}:dlq`.
    #[must_use]
    pub fn dlq_stream_key(&self) -> String {
        self.dlq_stream
            .clone()
            .unwrap_or_else(|| format!("{}:dlq", self.stream_key))
    }
}

/// Fluent builder for [`StreamsBackendConfig`].
#[derive(Debug, Clone)]
pub struct StreamsBackendConfigBuilder(StreamsBackendConfig);

impl StreamsBackendConfigBuilder {
    /// Override `pool_size`.
    #[must_use]
    pub const fn pool_size(mut self, pool_size: usize) -> Self {
        self.0.pool_size = pool_size;
        self
    }

    /// Override `max_retries`.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: u32) -> Self {
        self.0.max_retries = max_retries;
        self
    }

    /// Override `claim_min_idle`.
    #[must_use]
    pub const fn claim_min_idle(mut self, claim_min_idle: Duration) -> Self {
        self.0.claim_min_idle = claim_min_idle;
        self
    }

    /// Override the DLQ stream key (default: `{stream_key}:dlq`).
    #[must_use]
    pub fn dlq_stream(mut self, dlq_stream: impl Into<String>) -> Self {
        self.0.dlq_stream = Some(dlq_stream.into());
        self
    }

    /// Build the final [`StreamsBackendConfig`].
    #[must_use]
    pub fn build(self) -> StreamsBackendConfig {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = StreamsBackendConfig::builder("events", "workers", "worker-1").build();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.claim_min_idle, Duration::from_secs(30));
        assert_eq!(config.dlq_stream_key(), "events:dlq");
    }

    #[test]
    fn explicit_dlq_stream_overrides_default() {
        let config = StreamsBackendConfig::builder("events", "workers", "worker-1")
            .dlq_stream("events:failed")
            .build();
        assert_eq!(config.dlq_stream_key(), "events:failed");
    }
}

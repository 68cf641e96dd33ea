//! `SpineConfig`: the dispatcher's tunables (`SPEC_FULL.md` §6, §10.3).
//!
//! Follows the teacher's builder convention (see `circuit_breaker::CircuitBreakerConfig`): a
//! `Default` impl carrying the spec's defaults, plus a fluent builder for callers who want to
//! override a handful of fields without naming all of them.

use crate::policy::{EnqueueFailureMode, HandlerFailureMode};
use std::time::Duration;

/// Configuration for one [`crate::spine::Spine`] instance.
#[derive(Debug, Clone)]
pub struct SpineConfig {
    /// Abort `run` with an error after this many events have been processed.
    pub max_steps: u64,
    /// Number of retry attempts for `EnqueueFailureMode::Retry`.
    pub retry_attempts: usize,
    /// Base delay for `EnqueueFailureMode::Retry`'s exponential backoff.
    pub retry_base_delay: Duration,
    /// Per-handler invocation deadline.
    pub handler_timeout: Duration,
    /// Consecutive `Backend::pull` failures before `run` terminates with `BackendUnavailable`.
    pub max_consecutive_backend_failures: u64,
    /// How the spine reacts to `Backend::enqueue` failures.
    pub enqueue_failure_mode: EnqueueFailureMode,
    /// How the spine reacts to organ handler failures.
    pub handler_failure_mode: HandlerFailureMode,
    /// Bound on the `FailedEventStore` the spine constructs if the caller doesn't supply one.
    pub failed_event_store_max_size: usize,
    /// How long `Backend::pull` is allowed to block per loop iteration.
    pub pull_timeout: Duration,
}

impl Default for SpineConfig {
    fn default() -> Self {
        Self {
            max_steps: 10_000,
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(100),
            handler_timeout: Duration::from_secs(30),
            max_consecutive_backend_failures: 10,
            enqueue_failure_mode: EnqueueFailureMode::default(),
            handler_failure_mode: HandlerFailureMode::default(),
            failed_event_store_max_size: spine_core::failed_event_store::DEFAULT_MAX_SIZE,
            pull_timeout: Duration::from_secs(1),
        }
    }
}

impl SpineConfig {
    /// Start building a config from the defaults above.
    #[must_use]
    pub fn builder() -> SpineConfigBuilder {
        SpineConfigBuilder(Self::default())
    }
}

/// Fluent builder for [`SpineConfig`].
#[derive(Debug, Clone)]
pub struct SpineConfigBuilder(SpineConfig);

impl SpineConfigBuilder {
    /// Override `max_steps`.
    #[must_use]
    pub const fn max_steps(mut self, max_steps: u64) -> Self {
        self.0.max_steps = max_steps;
        self
    }

    /// Override `retry_attempts`.
    #[must_use]
    pub const fn retry_attempts(mut self, retry_attempts: usize) -> Self {
        self.0.retry_attempts = retry_attempts;
        self
    }

    /// Override `retry_base_delay`.
    #[must_use]
    pub const fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.0.retry_base_delay = delay;
        self
    }

    /// Override `handler_timeout`.
    #[must_use]
    pub const fn handler_timeout(mut self, timeout: Duration) -> Self {
        self.0.handler_timeout = timeout;
        self
    }

    /// Override `max_consecutive_backend_failures`.
    #[must_use]
    pub const fn max_consecutive_backend_failures(mut self, threshold: u64) -> Self {
        self.0.max_consecutive_backend_failures = threshold;
        self
    }

    /// Override `enqueue_failure_mode`.
    #[must_use]
    pub const fn enqueue_failure_mode(mut self, mode: EnqueueFailureMode) -> Self {
        self.0.enqueue_failure_mode = mode;
        self
    }

    /// Override `handler_failure_mode`.
    #[must_use]
    pub const fn handler_failure_mode(mut self, mode: HandlerFailureMode) -> Self {
        self.0.handler_failure_mode = mode;
        self
    }

    /// Override `failed_event_store_max_size`.
    #[must_use]
    pub const fn failed_event_store_max_size(mut self, max_size: usize) -> Self {
        self.0.failed_event_store_max_size = max_size;
        self
    }

    /// Override `pull_timeout`.
    #[must_use]
    pub const fn pull_timeout(mut self, timeout: Duration) -> Self {
        self.0.pull_timeout = timeout;
        self
    }

    /// Build the final [`SpineConfig`].
    #[must_use]
    pub fn build(self) -> SpineConfig {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_defaults() {
        let config = SpineConfig::default();
        assert_eq!(config.max_steps, 10_000);
        assert_eq!(config.max_consecutive_backend_failures, 10);
        assert_eq!(config.enqueue_failure_mode, EnqueueFailureMode::Fail);
        assert_eq!(config.handler_failure_mode, HandlerFailureMode::Log);
    }

    #[test]
    fn builder_overrides_only_named_fields() {
        let config = SpineConfig::builder()
            .max_steps(5)
            .handler_failure_mode(HandlerFailureMode::Store)
            .build();
        assert_eq!(config.max_steps, 5);
        assert_eq!(config.handler_failure_mode, HandlerFailureMode::Store);
        assert_eq!(config.retry_attempts, 3);
    }
}

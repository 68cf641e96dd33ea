//! Prometheus metrics for the dispatcher, the in-memory backend, and the pull-failure breaker.
//!
//! # Example
//!
//! ```rust,no_run
//! use spine_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter.
    #[error("failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter.
    #[error("failed to install metrics exporter: {0}")]
    Install(String),
    /// Failed to bind HTTP server.
    #[error("failed to bind metrics server: {0}")]
    Bind(#[from] std::io::Error),
}

/// Prometheus metrics server, exposing `/metrics` for scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server bound to `addr` (not yet listening — call [`Self::start`]).
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Build`] if the histogram bucket configuration is invalid, or
    /// [`MetricsError::Install`] if a recorder is already installed for a reason other than a
    /// previous call to this method (which is tolerated, e.g. across multiple test modules).
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "metrics server started");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// The installed recorder's handle, if [`Self::start`] has succeeded.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!("spine.events_processed", "Total events pulled and dispatched");
    describe_counter!("spine.events_emitted", "Total events enqueued by organs");
    describe_counter!(
        "spine.enqueue_failures",
        "Total enqueue failures, by event_type"
    );
    describe_counter!("spine.handler_errors", "Total handler errors, by organ_name");
    describe_counter!("spine.backend_errors", "Total backend pull/ack errors");
    describe_counter!("spine.ack_errors", "Total ack failures");
    describe_histogram!(
        "spine.handler_duration_seconds",
        "Time taken to invoke one organ's handle()"
    );
    describe_histogram!(
        "backend.pull_duration_seconds",
        "Time taken for one Backend::pull call"
    );

    describe_gauge!(
        "spine.pull_failure_breaker.consecutive_failures",
        "Current consecutive Backend::pull failure count"
    );

    describe_counter!("backend.in_memory.enqueued", "Events enqueued to the in-memory backend");
    describe_counter!("backend.in_memory.pulled", "Events pulled from the in-memory backend");
    describe_counter!(
        "backend.in_memory.rejected_full",
        "Enqueue attempts rejected because the bounded backend was full"
    );

    describe_counter!("spine.failed_event_store.dropped", "Entries evicted from the FailedEventStore");
    describe_gauge!("spine.failed_event_store.size", "Current FailedEventStore entry count");

    describe_counter!("retry.attempts", "Total retry attempts for EnqueueFailureMode::Retry");
    describe_counter!("retry.successes", "Total retries that eventually succeeded");
    describe_counter!("retry.exhausted", "Total retry sequences that exhausted max_retries");
}

/// Dispatcher-level metrics recorder.
pub struct SpineMetrics;

impl SpineMetrics {
    /// Record one dispatched event and the time its organs collectively took.
    pub fn record_event_processed(duration: Duration) {
        counter!("spine.events_processed").increment(1);
        histogram!("spine.handler_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record one emitted (enqueued) event.
    pub fn record_event_emitted() {
        counter!("spine.events_emitted").increment(1);
    }

    /// Record an enqueue failure for `event_type`.
    pub fn record_enqueue_failure(event_type: String) {
        counter!("spine.enqueue_failures", "event_type" => event_type).increment(1);
    }

    /// Record a handler error for `organ_name`.
    pub fn record_handler_error(organ_name: String) {
        counter!("spine.handler_errors", "organ_name" => organ_name).increment(1);
    }

    /// Record a backend pull/ack error.
    pub fn record_backend_error() {
        counter!("spine.backend_errors").increment(1);
    }

    /// Record an ack failure.
    pub fn record_ack_error() {
        counter!("spine.ack_errors").increment(1);
    }
}

/// `Backend::pull` latency recorder, used by both `InMemoryBackend` and `StreamsBackend`.
pub struct BackendMetrics;

impl BackendMetrics {
    /// Record a pull's duration, regardless of whether it returned an event.
    pub fn record_pull_duration(duration: Duration) {
        histogram!("backend.pull_duration_seconds").record(duration.as_secs_f64());
    }
}

/// Pull-failure breaker metrics recorder.
pub struct BreakerMetrics;

impl BreakerMetrics {
    /// Record the breaker's current consecutive-failure count.
    pub fn record_consecutive_failures(count: u64) {
        #[allow(clippy::cast_precision_loss)]
        gauge!("spine.pull_failure_breaker.consecutive_failures").set(count as f64);
    }
}

/// `EnqueueFailureMode::Retry` metrics recorder.
pub struct RetryMetrics;

impl RetryMetrics {
    /// Record a retry attempt.
    pub fn record_attempt() {
        counter!("retry.attempts").increment(1);
    }

    /// Record a retry sequence that eventually succeeded.
    pub fn record_success() {
        counter!("retry.successes").increment(1);
    }

    /// Record a retry sequence that exhausted `max_retries`.
    pub fn record_exhausted() {
        counter!("retry.exhausted").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn metrics_server_creation_has_no_handle_until_started() {
        let addr = "127.0.0.1:0".parse().expect("valid addr");
        let server = MetricsServer::new(addr);
        assert!(server.handle().is_none());
    }

    #[tokio::test]
    async fn metrics_server_start_is_idempotent_across_tests() {
        let addr = "127.0.0.1:0".parse().expect("valid addr");
        let mut server = MetricsServer::new(addr);
        let result = server.start();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn spine_metrics_render_when_recorder_available() {
        let addr = "127.0.0.1:0".parse().expect("valid addr");
        let mut server = MetricsServer::new(addr);
        server.start().expect("should start");

        SpineMetrics::record_event_processed(Duration::from_millis(5));
        SpineMetrics::record_event_emitted();

        if let Some(rendered) = server.render() {
            assert!(rendered.contains("spine_events_processed") || rendered.contains("spine.events_processed"));
        }
    }
}

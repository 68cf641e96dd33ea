//! The spine dispatch loop (`SPEC_FULL.md` §4.6).
//!
//! Grounded in shape on `original_source/necrostack/core/spine.py` (`_routing_table` built once
//! at construction, per-organ try/catch that keeps dispatching to the remaining organs, a
//! `run`/`stop`/`max_steps` control loop), enriched with the failure-mode policies, handler
//! timeout, and circuit breaker this spec adds on top of that reference (the Python original has
//! none of those — see `DESIGN.md`).

use crate::circuit_breaker::PullFailureBreaker;
use crate::config::SpineConfig;
use crate::policy::{EnqueueFailureMode, HandlerFailureMode};
use crate::stats::{SpineStats, SpineStatsSnapshot};
use spine_core::backend::{Backend, BackendError};
use spine_core::event::Event;
use spine_core::failed_event_store::FailedEventStore;
use spine_core::organ::Organ;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::timeout;

/// Terminal errors from [`Spine::run`].
#[derive(Error, Debug)]
pub enum SpineError {
    /// One organ's declared `listens_to` contained an empty string.
    #[error("organ {organ_name:?} declared an empty event_type in listens_to")]
    InvalidOrganRegistration {
        /// The offending organ's name.
        organ_name: String,
    },

    /// `events_processed` reached `max_steps`.
    #[error("max_steps ({max_steps}) exceeded")]
    MaxStepsExceeded {
        /// The configured step limit.
        max_steps: u64,
    },

    /// The pull-failure breaker tripped: `max_consecutive_backend_failures` consecutive
    /// `Backend::pull` failures were observed.
    #[error("backend unavailable after {failure_count} consecutive pull failures: {last_error}")]
    BackendUnavailable {
        /// The number of consecutive failures observed.
        failure_count: u64,
        /// The most recent underlying error message.
        last_error: String,
    },

    /// `Backend::enqueue` failed under `EnqueueFailureMode::Fail`, or exhausted its retries
    /// under `EnqueueFailureMode::Retry`.
    #[error("failed to enqueue event for {event_type:?}: {source}")]
    Enqueue {
        /// The event type the spine was trying to enqueue.
        event_type: String,
        /// The underlying backend error.
        #[source]
        source: BackendError,
    },

    /// The initial `start_event` (if any) could not be enqueued.
    #[error("failed to enqueue start_event: {0}")]
    StartEventEnqueue(#[source] BackendError),
}

/// The single-writer dispatcher: pulls one event at a time, routes it to matching organs in
/// registration order, enqueues emitted events, and applies the configured failure-mode
/// policies.
///
/// A `Spine` is single-use per [`Spine::run`] call: the pull-failure breaker resets at the start
/// of every `run`, though accumulated [`SpineStatsSnapshot`] persists across calls on the same
/// instance.
pub struct Spine {
    organs: Vec<Arc<dyn Organ>>,
    routing_table: HashMap<String, Vec<usize>>,
    backend: Arc<dyn Backend>,
    config: SpineConfig,
    failed_event_store: Arc<FailedEventStore>,
    stats: SpineStats,
    running: AtomicBool,
}

impl Spine {
    /// Construct a dispatcher over `organs`, dispatching against `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`SpineError::InvalidOrganRegistration`] if any organ's `listens_to` contains an
    /// empty string.
    pub fn new(
        organs: Vec<Arc<dyn Organ>>,
        backend: Arc<dyn Backend>,
        config: SpineConfig,
    ) -> Result<Self, SpineError> {
        let mut routing_table: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, organ) in organs.iter().enumerate() {
            for event_type in organ.listens_to() {
                if event_type.trim().is_empty() {
                    return Err(SpineError::InvalidOrganRegistration {
                        organ_name: organ.name().to_string(),
                    });
                }
                routing_table
                    .entry(event_type.clone())
                    .or_default()
                    .push(index);
            }
        }
        let failed_event_store = Arc::new(FailedEventStore::new(config.failed_event_store_max_size));
        Ok(Self {
            organs,
            routing_table,
            backend,
            config,
            failed_event_store,
            stats: SpineStats::new(),
            running: AtomicBool::new(false),
        })
    }

    /// Replace the constructed `FailedEventStore` (e.g. to share one across multiple spines, or
    /// to preset one for a test assertion).
    #[must_use]
    pub fn with_failed_event_store(mut self, store: Arc<FailedEventStore>) -> Self {
        self.failed_event_store = store;
        self
    }

    /// The dead-letter sink events are recorded to under `HandlerFailureMode::Store` and
    /// `EnqueueFailureMode::Store`.
    #[must_use]
    pub fn failed_event_store(&self) -> &Arc<FailedEventStore> {
        &self.failed_event_store
    }

    /// A snapshot of the statistics accumulated so far.
    #[must_use]
    pub fn stats(&self) -> SpineStatsSnapshot {
        self.stats.snapshot()
    }

    /// Request that [`Spine::run`] stop after it finishes dispatching the current event.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Run the dispatch loop until `stop()` is called, `max_steps` is reached, or the pull
    /// failure breaker trips.
    ///
    /// If `start_event` is supplied, it is enqueued before the loop begins.
    ///
    /// # Errors
    ///
    /// See [`SpineError`]'s variants.
    pub async fn run(&self, start_event: Option<Event>) -> Result<SpineStatsSnapshot, SpineError> {
        if let Some(event) = start_event {
            self.backend
                .enqueue(event)
                .await
                .map_err(SpineError::StartEventEnqueue)?;
        }

        let breaker = PullFailureBreaker::new(self.config.max_consecutive_backend_failures);
        self.running.store(true, Ordering::SeqCst);

        while self.running.load(Ordering::SeqCst) {
            if self.stats.snapshot().events_processed >= self.config.max_steps {
                return Err(SpineError::MaxStepsExceeded {
                    max_steps: self.config.max_steps,
                });
            }

            let pull_start = std::time::Instant::now();
            let pulled = self.backend.pull(self.config.pull_timeout).await;
            crate::metrics::BackendMetrics::record_pull_duration(pull_start.elapsed());

            let event = match pulled {
                Ok(Some(event)) => {
                    breaker.record_success();
                    event
                }
                Ok(None) => continue,
                Err(e) => {
                    self.stats.record_backend_error();
                    crate::metrics::SpineMetrics::record_backend_error();
                    let count = breaker.record_failure();
                    crate::metrics::BreakerMetrics::record_consecutive_failures(count);
                    if breaker.is_tripped() {
                        return Err(SpineError::BackendUnavailable {
                            failure_count: count,
                            last_error: e.to_string(),
                        });
                    }
                    continue;
                }
            };

            self.dispatch_one(event).await?;
        }

        Ok(self.stats.snapshot())
    }

    async fn dispatch_one(&self, event: Event) -> Result<(), SpineError> {
        let dispatch_start = std::time::Instant::now();
        self.stats.record_event_processed();

        let mut handler_failed = false;
        let mut last_error: Option<String> = None;

        if let Some(indices) = self.routing_table.get(event.event_type()) {
            for &index in indices {
                let organ = &self.organs[index];
                tracing::debug!(
                    event_id = %event.id(),
                    event_type = %event.event_type(),
                    organ = organ.name(),
                    "dispatching event to organ"
                );

                match timeout(self.config.handler_timeout, organ.handle(&event)).await {
                    Ok(Ok(outcome)) => {
                        for emitted in outcome.into_events() {
                            self.enqueue_emitted(emitted).await?;
                        }
                    }
                    Ok(Err(handler_error)) => {
                        handler_failed = true;
                        last_error = Some(handler_error.to_string());
                        self.stats.record_handler_error(organ.name());
                        crate::metrics::SpineMetrics::record_handler_error(organ.name().to_string());
                        tracing::error!(
                            event_id = %event.id(),
                            organ = organ.name(),
                            error = %handler_error,
                            "organ handler failed"
                        );
                    }
                    Err(_elapsed) => {
                        handler_failed = true;
                        last_error = Some(format!(
                            "organ {} timed out after {:?}",
                            organ.name(),
                            self.config.handler_timeout
                        ));
                        self.stats.record_handler_error(organ.name());
                        crate::metrics::SpineMetrics::record_handler_error(organ.name().to_string());
                        tracing::error!(
                            event_id = %event.id(),
                            organ = organ.name(),
                            timeout = ?self.config.handler_timeout,
                            "organ handler timed out"
                        );
                    }
                }
            }
        }

        self.resolve_ack(event, handler_failed, last_error).await;
        crate::metrics::SpineMetrics::record_event_processed(dispatch_start.elapsed());
        Ok(())
    }

    async fn enqueue_emitted(&self, event: Event) -> Result<(), SpineError> {
        match self.backend.enqueue(event.clone()).await {
            Ok(()) => {
                self.stats.record_event_emitted();
                crate::metrics::SpineMetrics::record_event_emitted();
                Ok(())
            }
            Err(first_error) => self.resolve_enqueue_failure(event, first_error).await,
        }
    }

    async fn resolve_enqueue_failure(
        &self,
        event: Event,
        first_error: BackendError,
    ) -> Result<(), SpineError> {
        self.stats.record_enqueue_failure(event.event_type());
        crate::metrics::SpineMetrics::record_enqueue_failure(event.event_type().to_string());

        match self.config.enqueue_failure_mode {
            EnqueueFailureMode::Fail => Err(SpineError::Enqueue {
                event_type: event.event_type().to_string(),
                source: first_error,
            }),
            EnqueueFailureMode::Store => {
                self.failed_event_store.push(event, first_error.to_string());
                Ok(())
            }
            EnqueueFailureMode::Retry => {
                let policy = crate::retry::RetryPolicy::builder()
                    .max_retries(self.config.retry_attempts)
                    .initial_delay(self.config.retry_base_delay)
                    .max_delay(self.config.retry_base_delay * 2u32.pow(16))
                    .multiplier(2.0)
                    .build();
                crate::metrics::RetryMetrics::record_attempt();
                let backend = Arc::clone(&self.backend);
                let event_for_retry = event.clone();
                let result = crate::retry::retry_with_backoff(policy, move || {
                    let backend = Arc::clone(&backend);
                    let event = event_for_retry.clone();
                    async move { backend.enqueue(event).await }
                })
                .await;
                match result {
                    Ok(()) => {
                        crate::metrics::RetryMetrics::record_success();
                        self.stats.record_event_emitted();
                        Ok(())
                    }
                    Err(last_error) => {
                        crate::metrics::RetryMetrics::record_exhausted();
                        Err(SpineError::Enqueue {
                            event_type: event.event_type().to_string(),
                            source: last_error,
                        })
                    }
                }
            }
        }
    }

    async fn resolve_ack(&self, event: Event, handler_failed: bool, last_error: Option<String>) {
        let should_store_to_dlq = handler_failed && self.config.handler_failure_mode == HandlerFailureMode::Store;
        let should_ack = !handler_failed || self.config.handler_failure_mode != HandlerFailureMode::Nack;

        if should_store_to_dlq {
            let reason = last_error.unwrap_or_else(|| "handler failed".to_string());
            self.failed_event_store.push(event.clone(), reason);
        }

        if should_ack {
            if let Err(e) = self.backend.ack(&event).await {
                self.stats.record_ack_error();
                crate::metrics::SpineMetrics::record_ack_error();
                tracing::warn!(
                    event_id = %event.id(),
                    error = %e,
                    "failed to ack event"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory_backend::InMemoryBackend;
    use async_trait::async_trait;
    use serde_json::Map;
    use spine_core::organ::{HandlerError, HandlerOutcome};
    use std::sync::atomic::AtomicU32;

    struct Forwarder {
        listens_to: Vec<String>,
        emits: String,
    }

    #[async_trait]
    impl Organ for Forwarder {
        fn listens_to(&self) -> &[String] {
            &self.listens_to
        }

        async fn handle(&self, _event: &Event) -> Result<HandlerOutcome, HandlerError> {
            let emitted = Event::new(self.emits.clone(), Map::new()).expect("should construct");
            Ok(HandlerOutcome::Single(emitted))
        }
    }

    struct Sink {
        listens_to: Vec<String>,
        seen: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Organ for Sink {
        fn listens_to(&self) -> &[String] {
            &self.listens_to
        }

        async fn handle(&self, _event: &Event) -> Result<HandlerOutcome, HandlerError> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(HandlerOutcome::None)
        }
    }

    struct AlwaysFails {
        listens_to: Vec<String>,
    }

    #[async_trait]
    impl Organ for AlwaysFails {
        fn listens_to(&self) -> &[String] {
            &self.listens_to
        }

        async fn handle(&self, _event: &Event) -> Result<HandlerOutcome, HandlerError> {
            Err(HandlerError::from("synthetic failure"))
        }
    }

    #[tokio::test]
    async fn s1_simple_chain_routes_in_registration_order() {
        let seen = Arc::new(AtomicU32::new(0));
        let organs: Vec<Arc<dyn Organ>> = vec![
            Arc::new(Forwarder {
                listens_to: vec!["START".to_string()],
                emits: "FOLLOW_UP".to_string(),
            }),
            Arc::new(Sink {
                listens_to: vec!["FOLLOW_UP".to_string()],
                seen: seen.clone(),
            }),
        ];
        let backend = Arc::new(InMemoryBackend::unbounded());
        let config = SpineConfig::builder().max_steps(2).build();
        let spine = Spine::new(organs, backend, config).expect("should construct");

        let start = Event::new("START", Map::new()).expect("should construct");
        let result = spine.run(Some(start)).await;

        match result {
            Err(SpineError::MaxStepsExceeded { max_steps }) => assert_eq!(max_steps, 2),
            other => panic!("expected MaxStepsExceeded, got {other:?}"),
        }
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        let stats = spine.stats();
        assert_eq!(stats.events_processed, 2);
        assert_eq!(stats.events_emitted, 1);
    }

    #[tokio::test]
    async fn s3_store_mode_dead_letters_and_acks() {
        let organs: Vec<Arc<dyn Organ>> = vec![Arc::new(AlwaysFails {
            listens_to: vec!["risky".to_string()],
        })];
        let backend = Arc::new(InMemoryBackend::unbounded());
        let config = SpineConfig::builder()
            .max_steps(1)
            .handler_failure_mode(HandlerFailureMode::Store)
            .build();
        let spine = Spine::new(organs, backend, config).expect("should construct");

        let start = Event::new("risky", Map::new()).expect("should construct");
        let _ = spine.run(Some(start)).await;

        assert_eq!(spine.failed_event_store().len(), 1);
        let entries = spine.failed_event_store().entries();
        assert_eq!(entries[0].reason, "synthetic failure");
        let stats = spine.stats();
        assert_eq!(stats.events_processed, 1);
        assert_eq!(stats.handler_errors.values().sum::<u64>(), 1);
    }

    #[tokio::test]
    async fn s4_circuit_breaker_trips_after_consecutive_pull_failures() {
        struct AlwaysErrorsBackend;
        impl Backend for AlwaysErrorsBackend {
            fn enqueue(&self, _event: Event) -> spine_core::backend::BackendFuture<'_, ()> {
                Box::pin(async { Ok(()) })
            }
            fn pull(&self, _timeout: std::time::Duration) -> spine_core::backend::BackendFuture<'_, Option<Event>> {
                Box::pin(async { Err(BackendError::Transport("boom".to_string())) })
            }
            fn ack(&self, _event: &Event) -> spine_core::backend::BackendFuture<'_, ()> {
                Box::pin(async { Ok(()) })
            }
        }

        let backend = Arc::new(AlwaysErrorsBackend);
        let config = SpineConfig::builder().max_consecutive_backend_failures(3).build();
        let spine = Spine::new(Vec::new(), backend, config).expect("should construct");

        let result = spine.run(None).await;
        match result {
            Err(SpineError::BackendUnavailable { failure_count, .. }) => assert_eq!(failure_count, 3),
            other => panic!("expected BackendUnavailable, got {other:?}"),
        }
        assert_eq!(spine.stats().backend_errors, 3);
    }

    #[tokio::test]
    async fn empty_listens_to_is_rejected_at_construction() {
        struct Mute;
        #[async_trait]
        impl Organ for Mute {
            fn listens_to(&self) -> &[String] {
                &[]
            }
            async fn handle(&self, _event: &Event) -> Result<HandlerOutcome, HandlerError> {
                Ok(HandlerOutcome::None)
            }
        }

        struct BadOrgan {
            listens_to: Vec<String>,
        }
        #[async_trait]
        impl Organ for BadOrgan {
            fn listens_to(&self) -> &[String] {
                &self.listens_to
            }
            async fn handle(&self, _event: &Event) -> Result<HandlerOutcome, HandlerError> {
                Ok(HandlerOutcome::None)
            }
        }

        let organs: Vec<Arc<dyn Organ>> = vec![
            Arc::new(Mute),
            Arc::new(BadOrgan {
                listens_to: vec![String::new()],
            }),
        ];
        let backend = Arc::new(InMemoryBackend::unbounded());
        let err = Spine::new(organs, backend, SpineConfig::default()).unwrap_err();
        assert!(matches!(err, SpineError::InvalidOrganRegistration { .. }));
    }
}

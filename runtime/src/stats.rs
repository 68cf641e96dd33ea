//! `SpineStats`: the statistics a dispatcher run accumulates (`SPEC_FULL.md` §4.6.8).

use std::collections::HashMap;
use std::sync::Mutex;

/// A point-in-time snapshot of a running (or finished) dispatcher's statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpineStatsSnapshot {
    /// Total events pulled and dispatched.
    pub events_processed: u64,
    /// Total events enqueued as a result of organ handlers.
    pub events_emitted: u64,
    /// Enqueue failures, keyed by the failing event's `event_type`.
    pub enqueue_failures: HashMap<String, u64>,
    /// Handler errors, keyed by the failing organ's name.
    pub handler_errors: HashMap<String, u64>,
    /// Total backend pull/ack transport errors.
    pub backend_errors: u64,
    /// Total ack failures (tracked separately from `backend_errors` per `DESIGN.md`'s OQ2).
    pub ack_errors: u64,
}

/// The mutable accumulator the spine updates as it runs. Cheaply snapshotted via
/// [`SpineStats::snapshot`].
#[derive(Debug, Default)]
pub struct SpineStats {
    inner: Mutex<SpineStatsSnapshot>,
}

impl SpineStats {
    /// Create a fresh, all-zero accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment `events_processed` by one.
    pub fn record_event_processed(&self) {
        self.inner.lock().expect("stats lock poisoned").events_processed += 1;
    }

    /// Increment `events_emitted` by one.
    pub fn record_event_emitted(&self) {
        self.inner.lock().expect("stats lock poisoned").events_emitted += 1;
    }

    /// Increment `enqueue_failures[event_type]` by one.
    pub fn record_enqueue_failure(&self, event_type: &str) {
        *self
            .inner
            .lock()
            .expect("stats lock poisoned")
            .enqueue_failures
            .entry(event_type.to_string())
            .or_insert(0) += 1;
    }

    /// Increment `handler_errors[organ_name]` by one.
    pub fn record_handler_error(&self, organ_name: &str) {
        *self
            .inner
            .lock()
            .expect("stats lock poisoned")
            .handler_errors
            .entry(organ_name.to_string())
            .or_insert(0) += 1;
    }

    /// Increment `backend_errors` by one.
    pub fn record_backend_error(&self) {
        self.inner.lock().expect("stats lock poisoned").backend_errors += 1;
    }

    /// Increment `ack_errors` by one.
    pub fn record_ack_error(&self) {
        self.inner.lock().expect("stats lock poisoned").ack_errors += 1;
    }

    /// A cloned, point-in-time snapshot of the accumulated statistics.
    #[must_use]
    pub fn snapshot(&self) -> SpineStatsSnapshot {
        self.inner.lock().expect("stats lock poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_across_distinct_keys() {
        let stats = SpineStats::new();
        stats.record_event_processed();
        stats.record_event_processed();
        stats.record_enqueue_failure("order.placed");
        stats.record_enqueue_failure("order.placed");
        stats.record_enqueue_failure("order.cancelled");
        stats.record_handler_error("validator");
        stats.record_backend_error();
        stats.record_ack_error();

        let snap = stats.snapshot();
        assert_eq!(snap.events_processed, 2);
        assert_eq!(snap.enqueue_failures.get("order.placed"), Some(&2));
        assert_eq!(snap.enqueue_failures.get("order.cancelled"), Some(&1));
        assert_eq!(snap.handler_errors.get("validator"), Some(&1));
        assert_eq!(snap.backend_errors, 1);
        assert_eq!(snap.ack_errors, 1);
    }

    #[test]
    fn new_accumulator_is_all_zero() {
        let stats = SpineStats::new();
        let snap = stats.snapshot();
        assert_eq!(snap, SpineStatsSnapshot::default());
    }
}

//! `FailedEventStore`: the in-process dead-letter sink.
//!
//! Events the dispatcher gives up on (`HandlerFailureMode::Store`, or events the streams backend
//! routes to its own DLQ stream before the dispatcher ever sees them again) are recorded here as
//! `(Event, reason)` pairs. The store is a bounded FIFO: once `max_size` is reached, the oldest
//! entry is evicted to make room and `dropped_count` is incremented.

use crate::event::Event;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Default bound on the number of entries retained, matching `spec.md` §3.
pub const DEFAULT_MAX_SIZE: usize = 10_000;

/// One dead-lettered event and why it ended up here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEntry {
    /// The event that could not be delivered.
    pub event: Event,
    /// A human-readable description of the failure.
    pub reason: String,
}

struct Inner {
    entries: VecDeque<FailedEntry>,
    max_size: usize,
    dropped_count: u64,
}

/// A bounded, FIFO-eviction store for events the dispatcher could not successfully process.
pub struct FailedEventStore {
    inner: Mutex<Inner>,
}

impl FailedEventStore {
    /// Create a store bounded at `max_size` entries. `max_size == 0` means "never retain
    /// anything" (every push is immediately an eviction of itself); this mirrors the bounded
    /// in-memory backend's "fail fast at capacity 0" posture rather than panicking.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: VecDeque::new(),
                max_size,
                dropped_count: 0,
            }),
        }
    }

    /// Record a failed event, evicting the oldest entry first if the store is at capacity.
    pub fn push(&self, event: Event, reason: impl Into<String>) {
        let mut inner = self.inner.lock().expect("failed event store lock poisoned");
        let entry = FailedEntry {
            event,
            reason: reason.into(),
        };
        if inner.max_size == 0 {
            inner.dropped_count += 1;
            tracing::warn!(
                event_id = %entry.event.id(),
                event_type = %entry.event.event_type(),
                reason = %entry.reason,
                "failed event store has max_size=0, dropping immediately"
            );
            metrics::counter!("spine.failed_event_store.dropped").increment(1);
            return;
        }
        if inner.entries.len() >= inner.max_size {
            inner.entries.pop_front();
            inner.dropped_count += 1;
            metrics::counter!("spine.failed_event_store.dropped").increment(1);
        }
        tracing::warn!(
            event_id = %entry.event.id(),
            event_type = %entry.event.event_type(),
            reason = %entry.reason,
            "event stored to failed event store"
        );
        metrics::gauge!("spine.failed_event_store.size").set(inner.entries.len() as f64 + 1.0);
        inner.entries.push_back(entry);
    }

    /// The number of entries currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("failed event store lock poisoned").entries.len()
    }

    /// Whether the store currently holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The total number of entries evicted over the store's lifetime.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.inner.lock().expect("failed event store lock poisoned").dropped_count
    }

    /// A snapshot of all currently retained entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<FailedEntry> {
        self.inner
            .lock()
            .expect("failed event store lock poisoned")
            .entries
            .iter()
            .cloned()
            .collect()
    }

    /// Remove all entries without affecting `dropped_count`.
    pub fn clear(&self) {
        self.inner.lock().expect("failed event store lock poisoned").entries.clear();
    }
}

impl Default for FailedEventStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn event(i: u32) -> Event {
        let mut payload = Map::new();
        payload.insert("i".to_string(), serde_json::Value::from(i));
        Event::new("failed", payload).expect("should construct")
    }

    #[test]
    fn push_and_read_back_preserves_order() {
        let store = FailedEventStore::new(10);
        store.push(event(1), "first failure");
        store.push(event(2), "second failure");
        let entries = store.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event.payload().get("i"), Some(&serde_json::Value::from(1)));
        assert_eq!(entries[1].event.payload().get("i"), Some(&serde_json::Value::from(2)));
    }

    #[test]
    fn evicts_oldest_when_full() {
        let store = FailedEventStore::new(2);
        store.push(event(1), "r1");
        store.push(event(2), "r2");
        store.push(event(3), "r3");

        let entries = store.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event.payload().get("i"), Some(&serde_json::Value::from(2)));
        assert_eq!(entries[1].event.payload().get("i"), Some(&serde_json::Value::from(3)));
        assert_eq!(store.dropped_count(), 1);
    }

    #[test]
    fn default_uses_spec_max_size() {
        let store = FailedEventStore::default();
        assert_eq!(store.len(), 0);
        assert_eq!(store.dropped_count(), 0);
    }

    #[test]
    fn clear_resets_entries_but_not_dropped_count() {
        let store = FailedEventStore::new(1);
        store.push(event(1), "r1");
        store.push(event(2), "r2");
        assert_eq!(store.dropped_count(), 1);
        store.clear();
        assert_eq!(store.len(), 0);
        assert_eq!(store.dropped_count(), 1);
    }
}

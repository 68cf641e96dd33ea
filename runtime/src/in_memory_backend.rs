//! `InMemoryBackend`: an in-process FIFO queue (`SPEC_FULL.md` §4.4).
//!
//! Grounded on `original_source/necrostack/backends/inmemory.py` (an `asyncio.Queue`-backed FIFO
//! with a blocking-with-timeout `pull`), adapted to Rust with a `tokio::sync::Mutex<VecDeque<_>>`
//! plus a `Notify` to wake a waiting `pull` as soon as something is enqueued — `tokio::sync::mpsc`
//! would also fit, but a deque keeps the bounded-capacity check (`len() >= max_size`) and the
//! "peek before waiting" `pull` loop straightforward.

use spine_core::backend::{Backend, BackendError, BackendFuture};
use spine_core::event::Event;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// An in-process, FIFO, optionally-bounded queue.
///
/// `max_size == 0` means unbounded: `enqueue` never fails for capacity reasons. With
/// `max_size > 0`, `enqueue` fails fast with [`BackendError::Full`] once the queue holds
/// `max_size` events — it never blocks the caller. `ack`/`nack` are no-ops, matching the spec's
/// "in-memory backend has no acknowledgment concept" contract.
pub struct InMemoryBackend {
    queue: Mutex<VecDeque<Event>>,
    max_size: usize,
    notify: Notify,
}

impl InMemoryBackend {
    /// Create an unbounded backend.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::bounded(0)
    }

    /// Create a backend that fails `enqueue` once it holds `max_size` events. `max_size == 0`
    /// means unbounded.
    #[must_use]
    pub fn bounded(max_size: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            max_size,
            notify: Notify::new(),
        }
    }

    /// The number of events currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().expect("in-memory backend lock poisoned").len()
    }

    /// Whether the queue currently holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl Backend for InMemoryBackend {
    fn enqueue(&self, event: Event) -> BackendFuture<'_, ()> {
        Box::pin(async move {
            let mut queue = self.queue.lock().expect("in-memory backend lock poisoned");
            if self.max_size > 0 && queue.len() >= self.max_size {
                metrics::counter!("backend.in_memory.rejected_full").increment(1);
                return Err(BackendError::Full {
                    capacity: self.max_size,
                });
            }
            queue.push_back(event);
            drop(queue);
            metrics::counter!("backend.in_memory.enqueued").increment(1);
            self.notify.notify_one();
            Ok(())
        })
    }

    fn pull(&self, timeout: Duration) -> BackendFuture<'_, Option<Event>> {
        Box::pin(async move {
            let start = Instant::now();
            loop {
                if let Some(event) = self.queue.lock().expect("in-memory backend lock poisoned").pop_front() {
                    metrics::counter!("backend.in_memory.pulled").increment(1);
                    return Ok(Some(event));
                }
                let remaining = timeout.saturating_sub(start.elapsed());
                if remaining.is_zero() {
                    return Ok(None);
                }
                tokio::select! {
                    () = self.notify.notified() => {}
                    () = tokio::time::sleep(remaining) => return Ok(None),
                }
            }
        })
    }

    fn ack(&self, _event: &Event) -> BackendFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    fn event(i: u32) -> Event {
        let mut payload = Map::new();
        payload.insert("i".to_string(), Value::from(i));
        Event::new("x", payload).expect("should construct")
    }

    #[tokio::test]
    async fn fifo_order_is_preserved() {
        let backend = InMemoryBackend::unbounded();
        for i in 0..1000 {
            backend.enqueue(event(i)).await.expect("should enqueue");
        }
        for i in 0..1000 {
            let pulled = backend
                .pull(Duration::from_millis(10))
                .await
                .expect("should pull")
                .expect("should have an event");
            assert_eq!(pulled.payload().get("i"), Some(&Value::from(i)));
        }
    }

    #[tokio::test]
    async fn pull_returns_none_on_timeout_when_empty() {
        let backend = InMemoryBackend::unbounded();
        let result = backend
            .pull(Duration::from_millis(20))
            .await
            .expect("should not error");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn bounded_backend_fails_fast_when_full() {
        let backend = InMemoryBackend::bounded(2);
        backend.enqueue(event(1)).await.expect("should enqueue");
        backend.enqueue(event(2)).await.expect("should enqueue");
        let err = backend.enqueue(event(3)).await.unwrap_err();
        assert!(matches!(err, BackendError::Full { capacity: 2 }));
    }

    #[tokio::test]
    async fn ack_is_a_no_op() {
        let backend = InMemoryBackend::unbounded();
        let e = event(1);
        backend.ack(&e).await.expect("should succeed");
    }

    #[tokio::test]
    async fn pull_wakes_as_soon_as_an_event_arrives() {
        let backend = std::sync::Arc::new(InMemoryBackend::unbounded());
        let producer = backend.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.enqueue(event(1)).await.expect("should enqueue");
        });
        let pulled = backend
            .pull(Duration::from_secs(1))
            .await
            .expect("should pull")
            .expect("should have an event");
        assert_eq!(pulled.payload().get("i"), Some(&Value::from(1)));
        handle.await.expect("producer task should finish");
    }
}

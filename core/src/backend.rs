//! The `Backend` queue abstraction.
//!
//! A backend is the pluggable transport behind the spine: it accepts events to enqueue, yields
//! the next event to process, and acknowledges (or negatively acknowledges) delivery. Two
//! implementations ship with this crate's sibling `spine-runtime`/`spine-streams` crates:
//! `InMemoryBackend` (FIFO, in-process) and `StreamsBackend` (durable, consumer-group based).
//!
//! # Dyn compatibility
//!
//! Like the teacher's `EventBus` trait, `Backend` uses explicit `Pin<Box<dyn Future<...> + Send +
//! '_>>` returns instead of `async fn` in the trait so that `Arc<dyn Backend>` can be shared
//! across a dispatcher and any number of concurrent consumer tasks.

use crate::event::Event;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Errors a backend can surface to the dispatcher.
#[derive(Error, Debug)]
pub enum BackendError {
    /// A bounded backend refused `enqueue` because it is at capacity.
    #[error("backend queue is full (capacity {capacity})")]
    Full {
        /// The backend's configured capacity.
        capacity: usize,
    },

    /// The underlying transport failed (connection lost, protocol error, etc.).
    #[error("backend transport error: {0}")]
    Transport(String),

    /// `ack`/`nack` was called for an event the backend has no record of.
    #[error("no pending delivery found for event {0}")]
    UnknownDelivery(String),
}

/// A future returned by a `Backend` operation.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BackendError>> + Send + 'a>>;

/// The pluggable queue behind a [`crate::organ::Organ`] pipeline.
///
/// All four operations may suspend. Implementations must be safe to share via `Arc` across a
/// dispatcher task and, for backends that support it, multiple concurrent consumers.
pub trait Backend: Send + Sync {
    /// Enqueue an event for later delivery.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Full`] if a bounded backend is at capacity, or
    /// [`BackendError::Transport`] on underlying transport failure.
    fn enqueue(&self, event: Event) -> BackendFuture<'_, ()>;

    /// Wait up to `timeout` for the next event.
    ///
    /// Returns `Ok(None)` if no event arrives before the deadline — this is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Transport`] on underlying transport failure. The dispatcher
    /// treats this as a circuit-breaker-counted pull failure.
    fn pull(&self, timeout: Duration) -> BackendFuture<'_, Option<Event>>;

    /// Acknowledge successful processing of a previously pulled event.
    ///
    /// Must be safe to call with an event the backend has no record of (e.g. an in-memory
    /// backend where `ack` is always a no-op) — implementations should not error in that case.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Transport`] on underlying transport failure.
    fn ack(&self, event: &Event) -> BackendFuture<'_, ()>;

    /// Negatively acknowledge a previously pulled event, routing it directly to the backend's
    /// dead-letter sink (if it has one) with `reason`.
    ///
    /// The default implementation is a no-op `Ok(())`, matching backends (like
    /// `InMemoryBackend`) that have no DLQ concept of their own.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Transport`] on underlying transport failure.
    fn nack<'a>(&'a self, _event: &'a Event, _reason: &'a str) -> BackendFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use std::sync::Mutex;

    #[derive(Default)]
    struct VecBackend {
        queue: Mutex<Vec<Event>>,
    }

    impl Backend for VecBackend {
        fn enqueue(&self, event: Event) -> BackendFuture<'_, ()> {
            Box::pin(async move {
                self.queue.lock().expect("lock").push(event);
                Ok(())
            })
        }

        fn pull(&self, _timeout: Duration) -> BackendFuture<'_, Option<Event>> {
            Box::pin(async move { Ok(self.queue.lock().expect("lock").pop()) })
        }

        fn ack(&self, _event: &Event) -> BackendFuture<'_, ()> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn default_nack_is_a_no_op() {
        let backend = VecBackend::default();
        let event = Event::new("x", Map::new()).expect("should construct");
        backend.nack(&event, "boom").await.expect("should succeed");
    }

    #[tokio::test]
    async fn enqueue_then_pull_round_trips() {
        let backend = VecBackend::default();
        let event = Event::new("x", Map::new()).expect("should construct");
        backend.enqueue(event.clone()).await.expect("should enqueue");
        let pulled = backend
            .pull(Duration::from_millis(10))
            .await
            .expect("should pull");
        assert_eq!(pulled, Some(event));
    }
}

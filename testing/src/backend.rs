//! A [`Backend`] wrapper that injects transient failures.
//!
//! Grounded on the `AlwaysErrorsBackend` fixture written inline in `spine-runtime`'s `spine.rs`
//! circuit-breaker test — generalized into a wrapper around any real backend, so a test can
//! exercise "the breaker trips, then the backend recovers" instead of only "the backend never
//! works".

use spine_core::backend::{Backend, BackendError, BackendFuture};
use spine_core::event::Event;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Wraps an inner [`Backend`], failing the first `fail_count` calls to `pull` with
/// [`BackendError::Transport`] before delegating every call after that to the inner backend.
///
/// `enqueue`/`ack`/`nack` always delegate directly; only `pull` is made flaky, since that is the
/// operation `Spine`'s circuit breaker watches.
pub struct FlakyBackend {
    inner: Arc<dyn Backend>,
    remaining_failures: AtomicUsize,
}

impl FlakyBackend {
    /// Wrap `inner`, failing the first `fail_count` calls to `pull`.
    #[must_use]
    pub fn new(inner: Arc<dyn Backend>, fail_count: usize) -> Self {
        Self {
            inner,
            remaining_failures: AtomicUsize::new(fail_count),
        }
    }
}

impl Backend for FlakyBackend {
    fn enqueue(&self, event: Event) -> BackendFuture<'_, ()> {
        self.inner.enqueue(event)
    }

    fn pull(&self, timeout: Duration) -> BackendFuture<'_, Option<Event>> {
        let should_fail = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                (remaining > 0).then_some(remaining - 1)
            })
            .is_ok();
        if should_fail {
            return Box::pin(async move {
                Err(BackendError::Transport("injected pull failure".to_string()))
            });
        }
        self.inner.pull(timeout)
    }

    fn ack(&self, event: &Event) -> BackendFuture<'_, ()> {
        self.inner.ack(event)
    }

    fn nack<'a>(&'a self, event: &'a Event, reason: &'a str) -> BackendFuture<'a, ()> {
        self.inner.nack(event, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct VecBackend {
        queue: StdMutex<Vec<Event>>,
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
    async fn fails_exactly_fail_count_times_then_delegates() {
        let inner: Arc<dyn Backend> = Arc::new(VecBackend::default());
        let event = Event::new("x", Map::new()).expect("should construct");
        inner.enqueue(event.clone()).await.expect("should enqueue");

        let flaky = FlakyBackend::new(inner, 2);
        assert!(flaky.pull(Duration::from_millis(1)).await.is_err());
        assert!(flaky.pull(Duration::from_millis(1)).await.is_err());

        let pulled = flaky
            .pull(Duration::from_millis(10))
            .await
            .expect("third pull should succeed");
        assert_eq!(pulled, Some(event));
    }
}

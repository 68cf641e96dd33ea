//! A [`Backend`] that stops a bound [`Spine`] once its queue has drained and stayed idle.
//!
//! Grounded on the `AutoStopBackend(InMemoryBackend)` class duplicated across
//! `original_source/examples/{notification_pipeline,trading_orderbook}/main.py`: once at least one
//! event has been delivered, a `pull` that comes back empty and has stayed empty past
//! `idle_timeout` stops the spine. The Python originals reach the not-yet-constructed `Spine`
//! through a `spine_holder: list` closed over before construction; this generalizes that into
//! [`AutoStopBackend::bind`], called with a `Weak` handle once the `Spine` exists.

use spine_core::backend::{Backend, BackendFuture};
use spine_core::event::Event;
use spine_runtime::in_memory_backend::InMemoryBackend;
use spine_runtime::spine::Spine;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::{Duration, Instant};

/// Wraps an unbounded [`InMemoryBackend`], stopping a bound [`Spine`] once `pull` has returned
/// `None` continuously for `idle_timeout` after at least one event was delivered.
///
/// Demos that enqueue a fixed batch of work up front and want `main` to return once the
/// pipeline has drained, instead of running forever or erroring out on `max_steps`, bind one of
/// these in place of a bare `InMemoryBackend`.
pub struct AutoStopBackend {
    inner: InMemoryBackend,
    spine: OnceLock<Weak<Spine>>,
    has_processed: AtomicBool,
    idle_since: Mutex<Option<Instant>>,
    idle_timeout: Duration,
}

impl AutoStopBackend {
    /// Wrap a fresh unbounded `InMemoryBackend`, stopping the bound spine after `idle_timeout` of
    /// no events following the first successful delivery.
    #[must_use]
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            inner: InMemoryBackend::unbounded(),
            spine: OnceLock::new(),
            has_processed: AtomicBool::new(false),
            idle_since: Mutex::new(None),
            idle_timeout,
        }
    }

    /// Bind the spine this backend should stop once idle.
    ///
    /// Must be called before `spine.run(..)` is awaited. A second call is silently ignored, like
    /// [`OnceLock::set`].
    pub fn bind(&self, spine: &Arc<Spine>) {
        let _ = self.spine.set(Arc::downgrade(spine));
    }
}

impl Backend for AutoStopBackend {
    fn enqueue(&self, event: Event) -> BackendFuture<'_, ()> {
        self.inner.enqueue(event)
    }

    fn pull(&self, timeout: Duration) -> BackendFuture<'_, Option<Event>> {
        Box::pin(async move {
            let event = self.inner.pull(timeout).await?;
            if event.is_some() {
                self.has_processed.store(true, Ordering::SeqCst);
                *self.idle_since.lock().expect("autostop backend lock poisoned") = None;
            } else if self.has_processed.load(Ordering::SeqCst) {
                let mut idle_since = self.idle_since.lock().expect("autostop backend lock poisoned");
                let since = *idle_since.get_or_insert_with(Instant::now);
                if since.elapsed() > self.idle_timeout {
                    if let Some(spine) = self.spine.get().and_then(Weak::upgrade) {
                        spine.stop();
                    }
                }
            }
            Ok(event)
        })
    }

    fn ack(&self, event: &Event) -> BackendFuture<'_, ()> {
        self.inner.ack(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use spine_core::organ::{HandlerError, HandlerOutcome, Organ};
    use spine_runtime::config::SpineConfig;
    use std::sync::atomic::AtomicU32;

    struct Counter {
        listens_to: Vec<String>,
        count: Arc<AtomicU32>,
    }

    #[async_trait::async_trait]
    impl Organ for Counter {
        fn listens_to(&self) -> &[String] {
            &self.listens_to
        }

        async fn handle(&self, _event: &Event) -> Result<HandlerOutcome, HandlerError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(HandlerOutcome::None)
        }
    }

    #[tokio::test]
    async fn stops_once_idle_after_draining_the_queue() {
        let count = Arc::new(AtomicU32::new(0));
        let organs: Vec<Arc<dyn Organ>> = vec![Arc::new(Counter {
            listens_to: vec!["tick".to_string()],
            count: count.clone(),
        })];
        let backend = Arc::new(AutoStopBackend::new(Duration::from_millis(30)));
        let config = SpineConfig::builder()
            .max_steps(1_000)
            .pull_timeout(Duration::from_millis(20))
            .build();
        let spine = Arc::new(Spine::new(organs, backend.clone(), config).expect("should construct"));
        backend.bind(&spine);

        for _ in 0..5 {
            backend
                .enqueue(Event::new("tick", Map::new()).expect("should construct"))
                .await
                .expect("should enqueue");
        }

        let result = tokio::time::timeout(Duration::from_secs(2), spine.run(None))
            .await
            .expect("spine should stop on its own instead of hanging");
        assert!(result.is_ok());
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }
}

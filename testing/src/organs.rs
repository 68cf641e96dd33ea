//! Scripted and counting [`Organ`] fixtures.
//!
//! Grounded on the ad hoc `Forwarder`/`Sink`/`AlwaysFails` test organs written inline in
//! `spine-runtime`'s `spine.rs` test module — generalized here so every crate that needs a
//! "handler that emits X" or "handler that fails N times then succeeds" doesn't redefine one.

use serde_json::Map;
use spine_core::event::Event;
use spine_core::organ::{HandlerError, HandlerOutcome, Organ};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A scripted sequence of results, one per call to [`Organ::handle`].
///
/// The script is consumed in order. Once exhausted, further calls repeat the final entry — this
/// matches how the teacher's inline `AlwaysFails` organs behaved (always the same outcome), while
/// still letting a test script "fail twice, then succeed" by giving a script of length 3.
pub struct ScriptedOrgan {
    name: String,
    listens_to: Vec<String>,
    script: Mutex<Vec<Result<HandlerOutcome, HandlerError>>>,
    calls: AtomicUsize,
}

impl ScriptedOrgan {
    /// Build an organ named `name`, listening to `listens_to`, that returns each entry of
    /// `script` in order (repeating the last entry once exhausted).
    ///
    /// # Panics
    ///
    /// Panics if `script` is empty — a scripted organ with nothing to say is a test-authoring
    /// mistake, not a valid fixture.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        listens_to: Vec<String>,
        script: Vec<Result<HandlerOutcome, HandlerError>>,
    ) -> Self {
        assert!(!script.is_empty(), "ScriptedOrgan needs at least one scripted result");
        Self {
            name: name.into(),
            listens_to,
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
        }
    }

    /// An organ that always emits a single event of `emits_type` with an empty payload.
    #[must_use]
    pub fn forwarding(name: impl Into<String>, listens_to: Vec<String>, emits_type: impl Into<String>) -> Self {
        let emits_type = emits_type.into();
        let emitted = Event::new(emits_type, Map::new()).expect("emitted event type must be valid");
        Self::new(name, listens_to, vec![Ok(HandlerOutcome::Single(emitted))])
    }

    /// An organ that consumes every matching event and emits nothing.
    #[must_use]
    pub fn sink(name: impl Into<String>, listens_to: Vec<String>) -> Self {
        Self::new(name, listens_to, vec![Ok(HandlerOutcome::None)])
    }

    /// An organ that always fails with `reason`.
    #[must_use]
    pub fn always_fails(name: impl Into<String>, listens_to: Vec<String>, reason: impl Into<String>) -> Self {
        Self::new(name, listens_to, vec![Err(HandlerError(reason.into()))])
    }

    /// Total number of times [`Organ::handle`] has been called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Organ for ScriptedOrgan {
    fn name(&self) -> &str {
        &self.name
    }

    fn listens_to(&self) -> &[String] {
        &self.listens_to
    }

    async fn handle(&self, _event: &Event) -> Result<HandlerOutcome, HandlerError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let mut script = self.script.lock().expect("scripted organ lock poisoned");
        let index = script.len().saturating_sub(1).min(self.calls.load(Ordering::Relaxed) - 1);
        script[index].clone()
    }
}

/// An organ that records every event it was handed, in order, and returns a fixed outcome.
///
/// Use this where a test only needs to assert *that* (and *what*) a handler was called, not to
/// script varying results across calls.
pub struct CountingOrgan {
    name: String,
    listens_to: Vec<String>,
    seen: Mutex<Vec<Event>>,
    outcome: HandlerOutcome,
}

impl CountingOrgan {
    /// Build a counting organ that listens to `listens_to` and always returns `outcome` on
    /// handling a matching event.
    #[must_use]
    pub fn new(name: impl Into<String>, listens_to: Vec<String>, outcome: HandlerOutcome) -> Self {
        Self {
            name: name.into(),
            listens_to,
            seen: Mutex::new(Vec::new()),
            outcome,
        }
    }

    /// Events handed to this organ so far, in call order.
    #[must_use]
    pub fn seen(&self) -> Vec<Event> {
        self.seen.lock().expect("counting organ lock poisoned").clone()
    }

    /// Number of events handed to this organ so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.seen.lock().expect("counting organ lock poisoned").len()
    }
}

#[async_trait::async_trait]
impl Organ for CountingOrgan {
    fn name(&self) -> &str {
        &self.name
    }

    fn listens_to(&self) -> &[String] {
        &self.listens_to
    }

    async fn handle(&self, event: &Event) -> Result<HandlerOutcome, HandlerError> {
        self.seen.lock().expect("counting organ lock poisoned").push(event.clone());
        Ok(self.outcome.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_organ_replays_then_repeats_last_entry() {
        let organ = ScriptedOrgan::new(
            "flaky",
            vec!["x".to_string()],
            vec![
                Err(HandlerError("boom".to_string())),
                Ok(HandlerOutcome::None),
            ],
        );
        let event = Event::new("x", Map::new()).expect("should construct");

        assert!(organ.handle(&event).await.is_err());
        assert!(organ.handle(&event).await.is_ok());
        assert!(organ.handle(&event).await.is_ok());
        assert_eq!(organ.call_count(), 3);
    }

    #[tokio::test]
    async fn counting_organ_records_every_event_in_order() {
        let organ = CountingOrgan::new("counter", vec!["x".to_string()], HandlerOutcome::None);
        let a = Event::new("x", Map::new()).expect("should construct");
        let b = Event::new("x", Map::new()).expect("should construct");

        organ.handle(&a).await.expect("should succeed");
        organ.handle(&b).await.expect("should succeed");

        let seen = organ.seen();
        assert_eq!(seen, vec![a, b]);
        assert_eq!(organ.call_count(), 2);
    }
}

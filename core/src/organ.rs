//! The `Organ` handler contract.
//!
//! An organ declares which event types it cares about ([`Organ::listens_to`]) and processes a
//! matching event ([`Organ::handle`]), returning zero, one, or many follow-up events. The
//! dispatcher never inspects organ-private state; organs own whatever counters, caches, or audit
//! logs they need.
//!
//! Every organ is async (`#[async_trait]`, matching the teacher's dyn-compatible trait
//! convention) so the dispatcher can apply a uniform handler timeout regardless of whether a
//! given organ's `handle` happens to suspend.

use crate::event::Event;
use async_trait::async_trait;
use std::fmt;

/// What an organ produced for one dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The organ consumed the event and produced no follow-up events.
    None,
    /// The organ produced exactly one follow-up event.
    Single(Event),
    /// The organ produced zero or more follow-up events, in emission order.
    Many(Vec<Event>),
}

impl HandlerOutcome {
    /// Normalize to a flat sequence of events to enqueue, in emission order.
    #[must_use]
    pub fn into_events(self) -> Vec<Event> {
        match self {
            Self::None => Vec::new(),
            Self::Single(event) => vec![event],
            Self::Many(events) => events,
        }
    }
}

impl From<()> for HandlerOutcome {
    fn from((): ()) -> Self {
        Self::None
    }
}

impl From<Event> for HandlerOutcome {
    fn from(event: Event) -> Self {
        Self::Single(event)
    }
}

impl From<Vec<Event>> for HandlerOutcome {
    fn from(events: Vec<Event>) -> Self {
        Self::Many(events)
    }
}

impl From<Option<Event>> for HandlerOutcome {
    fn from(event: Option<Event>) -> Self {
        event.map_or(Self::None, Self::Single)
    }
}

/// An error raised by an organ's `handle` implementation.
///
/// Organs report failures as plain strings (the description the dispatcher records against
/// `stats.handler_errors` and, under `HandlerFailureMode::Store`, against the failed-event
/// store). Organ authors who need richer error types should format them into this string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError(pub String);

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for HandlerError {}

impl From<String> for HandlerError {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for HandlerError {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A registered handler in the dispatch pipeline.
///
/// # Registration order
///
/// The spine invokes organs for a matching event in the order they were registered
/// (`Spine::new`'s `organs` argument), not the order of `listens_to` declarations.
#[async_trait]
pub trait Organ: Send + Sync {
    /// A human-readable name used in logs and in `stats.handler_errors` keys.
    ///
    /// Defaults to the Rust type name; override when a more specific name aids diagnostics
    /// (e.g. when the same organ type is instantiated multiple times with different config).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// The event types this organ wants to see. May be empty (the organ never fires).
    fn listens_to(&self) -> &[String];

    /// Process one matching event.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] describing why processing failed. The dispatcher applies the
    /// configured `HandlerFailureMode` to decide whether the event is acked, stored to the DLQ,
    /// or left pending.
    async fn handle(&self, event: &Event) -> Result<HandlerOutcome, HandlerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    struct Echo {
        listens_to: Vec<String>,
    }

    #[async_trait]
    impl Organ for Echo {
        fn listens_to(&self) -> &[String] {
            &self.listens_to
        }

        async fn handle(&self, event: &Event) -> Result<HandlerOutcome, HandlerError> {
            Ok(HandlerOutcome::Single(event.clone()))
        }
    }

    #[tokio::test]
    async fn organ_handle_produces_expected_outcome() {
        let organ = Echo {
            listens_to: vec!["ping".to_string()],
        };
        let event = Event::new("ping", Map::new()).expect("should construct");
        let outcome = organ.handle(&event).await.expect("should succeed");
        assert_eq!(outcome, HandlerOutcome::Single(event));
    }

    #[test]
    fn handler_outcome_into_events_flattens_variants() {
        let e = Event::new("x", Map::new()).expect("should construct");
        assert_eq!(HandlerOutcome::None.into_events(), Vec::<Event>::new());
        assert_eq!(HandlerOutcome::Single(e.clone()).into_events(), vec![e.clone()]);
        assert_eq!(
            HandlerOutcome::Many(vec![e.clone(), e.clone()]).into_events(),
            vec![e.clone(), e]
        );
    }
}

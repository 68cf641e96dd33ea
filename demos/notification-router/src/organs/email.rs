//! `EMAIL_SEND_REQUESTED` -> `EMAIL_DELIVERED`, simulating transport latency and transient
//! delivery failures.

use super::payload;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde_json::Value;
use spine_core::event::Event;
use spine_core::organ::{HandlerError, HandlerOutcome, Organ};
use std::time::Duration;

/// Delivers `EMAIL_SEND_REQUESTED` events, simulating network latency and a roughly 15% chance of
/// a transient transport failure.
///
/// The wiring this is grounded on dead-letters any handler failure rather than retrying it, so the
/// attempt-tracking cache the original kept (to taper the failure chance down across retries) never
/// actually got exercised; this drops that machinery in favor of a flat failure chance.
pub struct EmailOrgan {
    listens_to: Vec<String>,
}

impl Default for EmailOrgan {
    fn default() -> Self {
        Self {
            listens_to: vec!["EMAIL_SEND_REQUESTED".to_string()],
        }
    }
}

#[async_trait]
impl Organ for EmailOrgan {
    fn listens_to(&self) -> &[String] {
        &self.listens_to
    }

    async fn handle(&self, event: &Event) -> Result<HandlerOutcome, HandlerError> {
        let p = event.payload();
        let missing: Vec<&str> = ["email", "subject", "user_id"]
            .into_iter()
            .filter(|k| !p.contains_key(*k))
            .collect();
        if !missing.is_empty() {
            return Err(HandlerError::from(format!("missing required fields: {missing:?}")));
        }

        tokio::time::sleep(Duration::from_millis(50)).await;

        if rand::thread_rng().gen_bool(0.15) {
            return Err(HandlerError::from("simulated connection error sending email"));
        }

        tokio::time::sleep(Duration::from_millis(20)).await;

        let user_id = p.get("user_id").and_then(Value::as_str).unwrap_or_default().to_string();
        let email = p.get("email").and_then(Value::as_str).unwrap_or_default().to_string();
        let subject = p.get("subject").and_then(Value::as_str).unwrap_or_default().to_string();

        let delivered = Event::new(
            "EMAIL_DELIVERED",
            payload(vec![
                ("user_id", Value::String(user_id)),
                ("email", Value::String(email)),
                ("subject", Value::String(subject)),
                ("attempts", Value::from(1)),
                ("delivered_at", Value::String(Utc::now().to_rfc3339())),
            ]),
        )
        .map_err(|e| HandlerError::from(e.to_string()))?;

        Ok(HandlerOutcome::Single(delivered))
    }
}

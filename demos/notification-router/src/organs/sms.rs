//! `SMS_SEND_REQUESTED` -> `SMS_DELIVERED`, permanently rejecting a hardcoded set of blocked
//! numbers.

use super::payload;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use spine_core::event::Event;
use spine_core::organ::{HandlerError, HandlerOutcome, Organ};
use std::time::Duration;

/// Phone numbers that always fail delivery, exercising the dead-letter path without any
/// randomness involved.
pub const BLOCKED_NUMBERS: [&str; 2] = ["+1555000000", "+1555000001"];

/// Delivers `SMS_SEND_REQUESTED` events, simulating carrier latency. Numbers in
/// [`BLOCKED_NUMBERS`] are permanently undeliverable.
pub struct SmsOrgan {
    listens_to: Vec<String>,
}

impl Default for SmsOrgan {
    fn default() -> Self {
        Self {
            listens_to: vec!["SMS_SEND_REQUESTED".to_string()],
        }
    }
}

#[async_trait]
impl Organ for SmsOrgan {
    fn listens_to(&self) -> &[String] {
        &self.listens_to
    }

    async fn handle(&self, event: &Event) -> Result<HandlerOutcome, HandlerError> {
        let p = event.payload();
        let missing: Vec<&str> = ["phone", "message", "user_id"]
            .into_iter()
            .filter(|k| !p.contains_key(*k))
            .collect();
        if !missing.is_empty() {
            return Err(HandlerError::from(format!("missing required fields: {missing:?}")));
        }

        tokio::time::sleep(Duration::from_millis(30)).await;

        let phone = p.get("phone").and_then(Value::as_str).unwrap_or_default().to_string();
        if BLOCKED_NUMBERS.contains(&phone.as_str()) {
            return Err(HandlerError::from(format!("{phone} is a blocked number")));
        }

        let user_id = p.get("user_id").and_then(Value::as_str).unwrap_or_default().to_string();
        let message_length = p
            .get("message")
            .and_then(Value::as_str)
            .map(str::len)
            .unwrap_or_default();

        let delivered = Event::new(
            "SMS_DELIVERED",
            payload(vec![
                ("user_id", Value::String(user_id)),
                ("phone", Value::String(phone)),
                ("message_length", Value::from(message_length)),
                ("delivered_at", Value::String(Utc::now().to_rfc3339())),
            ]),
        )
        .map_err(|e| HandlerError::from(e.to_string()))?;

        Ok(HandlerOutcome::Single(delivered))
    }
}

//! `NOTIFICATION_REQUESTED` -> `NOTIFICATION_VALIDATED` | `NOTIFICATION_FAILED`.

use super::payload;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use spine_core::event::Event;
use spine_core::organ::{HandlerError, HandlerOutcome, Organ};
use std::collections::HashSet;

const VALID_CHANNELS: [&str; 3] = ["email", "sms", "push"];
const VALID_PRIORITIES: [&str; 4] = ["low", "normal", "high", "critical"];

/// Validates a notification request: `user_id` present, `channels` a non-empty subset of
/// `{email, sms, push}`, `message` non-empty, `priority` one of the known levels (defaults to
/// `normal`).
pub struct ValidateOrgan {
    listens_to: Vec<String>,
}

impl Default for ValidateOrgan {
    fn default() -> Self {
        Self {
            listens_to: vec!["NOTIFICATION_REQUESTED".to_string()],
        }
    }
}

#[async_trait]
impl Organ for ValidateOrgan {
    fn listens_to(&self) -> &[String] {
        &self.listens_to
    }

    async fn handle(&self, event: &Event) -> Result<HandlerOutcome, HandlerError> {
        let p = event.payload();
        let mut errors = Vec::new();

        let user_id = p
            .get("user_id")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string();
        if user_id.is_empty() {
            errors.push("user_id is required".to_string());
        }

        let channels: Vec<String> = p
            .get("channels")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        if channels.is_empty() {
            errors.push("at least one channel is required".to_string());
        } else {
            let valid: HashSet<&str> = VALID_CHANNELS.into_iter().collect();
            let invalid: Vec<&str> = channels
                .iter()
                .map(String::as_str)
                .filter(|c| !valid.contains(c))
                .collect();
            if !invalid.is_empty() {
                errors.push(format!("invalid channels: {invalid:?}"));
            }
        }

        let message = p.get("message").and_then(Value::as_str).unwrap_or("").trim().to_string();
        if message.is_empty() {
            errors.push("message is required".to_string());
        }

        let priority = p
            .get("priority")
            .and_then(Value::as_str)
            .unwrap_or("normal")
            .to_string();
        if !VALID_PRIORITIES.contains(&priority.as_str()) {
            errors.push(format!("invalid priority: {priority}"));
        }

        let outcome_event = if errors.is_empty() {
            Event::new(
                "NOTIFICATION_VALIDATED",
                payload(vec![
                    ("user_id", Value::String(user_id)),
                    (
                        "channels",
                        Value::Array(channels.into_iter().map(Value::String).collect()),
                    ),
                    ("message", Value::String(message)),
                    ("priority", Value::String(priority)),
                    ("validated_at", Value::String(Utc::now().to_rfc3339())),
                ]),
            )
        } else {
            let user_id = if user_id.is_empty() { "unknown".to_string() } else { user_id };
            Event::new(
                "NOTIFICATION_FAILED",
                payload(vec![
                    ("user_id", Value::String(user_id)),
                    ("reason", Value::String(errors.join("; "))),
                    ("original_event_id", Value::String(event.id().to_string())),
                    ("failed_at", Value::String(Utc::now().to_rfc3339())),
                ]),
            )
        }
        .map_err(|e| HandlerError::from(e.to_string()))?;

        Ok(HandlerOutcome::Single(outcome_event))
    }
}

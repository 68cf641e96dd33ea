//! `PUSH_SEND_REQUESTED` -> `PUSH_DELIVERED`. Push delivery never fails in this pipeline; it
//! exists mainly to show a third, always-succeeding channel alongside email and SMS.

use super::payload;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use spine_core::event::Event;
use spine_core::organ::{HandlerError, HandlerOutcome, Organ};
use std::time::Duration;

/// Delivers `PUSH_SEND_REQUESTED` events, simulating push-gateway latency.
pub struct PushOrgan {
    listens_to: Vec<String>,
}

impl Default for PushOrgan {
    fn default() -> Self {
        Self {
            listens_to: vec!["PUSH_SEND_REQUESTED".to_string()],
        }
    }
}

#[async_trait]
impl Organ for PushOrgan {
    fn listens_to(&self) -> &[String] {
        &self.listens_to
    }

    async fn handle(&self, event: &Event) -> Result<HandlerOutcome, HandlerError> {
        let p = event.payload();
        let missing: Vec<&str> = ["device_token", "title", "body", "user_id", "priority"]
            .into_iter()
            .filter(|k| !p.contains_key(*k))
            .collect();
        if !missing.is_empty() {
            return Err(HandlerError::from(format!("missing required fields: {missing:?}")));
        }

        tokio::time::sleep(Duration::from_millis(40)).await;

        let user_id = p.get("user_id").and_then(Value::as_str).unwrap_or_default().to_string();
        let device_token = p.get("device_token").and_then(Value::as_str).unwrap_or_default().to_string();
        let title = p.get("title").and_then(Value::as_str).unwrap_or_default().to_string();
        let body = p.get("body").and_then(Value::as_str).unwrap_or_default().to_string();

        let mut push_payload = Map::new();
        push_payload.insert("title".to_string(), Value::String(title));
        push_payload.insert("body".to_string(), Value::String(body));
        push_payload.insert("device_token".to_string(), Value::String(device_token.clone()));
        let push_payload_size = Value::Object(push_payload).to_string().len();

        let delivered = Event::new(
            "PUSH_DELIVERED",
            payload(vec![
                ("user_id", Value::String(user_id)),
                ("device_token", Value::String(device_token)),
                ("push_payload_size", Value::from(push_payload_size)),
                ("delivered_at", Value::String(Utc::now().to_rfc3339())),
            ]),
        )
        .map_err(|e| HandlerError::from(e.to_string()))?;

        Ok(HandlerOutcome::Single(delivered))
    }
}

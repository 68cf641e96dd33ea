//! `NOTIFICATION_VALIDATED` -> `{EMAIL,SMS,PUSH}_SEND_REQUESTED`, one per requested channel the
//! user has a matching contact for.

use super::payload;
use async_trait::async_trait;
use serde_json::Value;
use spine_core::event::Event;
use spine_core::organ::{HandlerError, HandlerOutcome, Organ};

struct Contact {
    email: Option<&'static str>,
    phone: Option<&'static str>,
    device_token: Option<&'static str>,
}

/// Looks up `user_id` in a hardcoded contact book and fans a validated notification out to a
/// `{EMAIL,SMS,PUSH}_SEND_REQUESTED` event per requested channel the user has a contact for.
///
/// `user_003`'s phone is a number [`super::sms::BLOCKED_NUMBERS`] permanently rejects, exercising
/// the dead-letter path further downstream.
pub struct RouterOrgan {
    listens_to: Vec<String>,
}

impl Default for RouterOrgan {
    fn default() -> Self {
        Self {
            listens_to: vec!["NOTIFICATION_VALIDATED".to_string()],
        }
    }
}

fn contact_for(user_id: &str) -> Option<Contact> {
    match user_id {
        "user_001" => Some(Contact {
            email: Some("alice@example.com"),
            phone: Some("+15550001111"),
            device_token: Some("device-token-alice"),
        }),
        "user_002" => Some(Contact {
            email: Some("bob@example.com"),
            phone: Some("+15550002222"),
            device_token: Some("device-token-bob"),
        }),
        "user_003" => Some(Contact {
            email: Some("charlie@example.com"),
            phone: Some("+1555000000"),
            device_token: Some("device-token-charlie"),
        }),
        _ => None,
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[async_trait]
impl Organ for RouterOrgan {
    fn listens_to(&self) -> &[String] {
        &self.listens_to
    }

    async fn handle(&self, event: &Event) -> Result<HandlerOutcome, HandlerError> {
        let p = event.payload();
        let missing: Vec<&str> = ["user_id", "channels", "message", "priority"]
            .into_iter()
            .filter(|k| !p.contains_key(*k))
            .collect();
        if !missing.is_empty() {
            let mut missing = missing;
            missing.sort_unstable();
            return Err(HandlerError::from(format!("missing required fields: {missing:?}")));
        }

        let user_id = p.get("user_id").and_then(Value::as_str).unwrap_or_default().to_string();
        let message = p.get("message").and_then(Value::as_str).unwrap_or_default().to_string();
        let priority = p.get("priority").and_then(Value::as_str).unwrap_or_default().to_string();
        let channels: Vec<String> = p
            .get("channels")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();

        let Some(contact) = contact_for(&user_id) else {
            return Ok(HandlerOutcome::None);
        };

        let mut events = Vec::new();
        for channel in &channels {
            let event = match channel.as_str() {
                "email" if contact.email.is_some() => Event::new(
                    "EMAIL_SEND_REQUESTED",
                    payload(vec![
                        ("user_id", Value::String(user_id.clone())),
                        ("email", Value::String(contact.email.unwrap().to_string())),
                        ("subject", Value::String(format!("[{priority}] Notification"))),
                        ("body", Value::String(message.clone())),
                        ("priority", Value::String(priority.clone())),
                    ]),
                ),
                "sms" if contact.phone.is_some() => Event::new(
                    "SMS_SEND_REQUESTED",
                    payload(vec![
                        ("user_id", Value::String(user_id.clone())),
                        ("phone", Value::String(contact.phone.unwrap().to_string())),
                        ("message", Value::String(truncate(&message, 160))),
                        ("priority", Value::String(priority.clone())),
                    ]),
                ),
                "push" if contact.device_token.is_some() => Event::new(
                    "PUSH_SEND_REQUESTED",
                    payload(vec![
                        ("user_id", Value::String(user_id.clone())),
                        ("device_token", Value::String(contact.device_token.unwrap().to_string())),
                        ("title", Value::String("New Notification".to_string())),
                        ("body", Value::String(truncate(&message, 256))),
                        ("priority", Value::String(priority.clone())),
                    ]),
                ),
                _ => continue,
            }
            .map_err(|e| HandlerError::from(e.to_string()))?;
            events.push(event);
        }

        Ok(HandlerOutcome::Many(events))
    }
}

//! `{EMAIL,SMS,PUSH}_DELIVERED` -> `DELIVERY_COMPLETED`, recording every delivery to an in-memory
//! audit log.

use super::payload;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use spine_core::event::Event;
use spine_core::organ::{HandlerError, HandlerOutcome, Organ};
use std::sync::Mutex;

/// One recorded delivery.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    /// The user the notification was delivered to.
    pub user_id: String,
    /// The channel it was delivered over (`email`, `sms`, or `push`).
    pub channel: String,
    /// The id of the `*_DELIVERED` event this record was built from.
    pub event_id: String,
}

/// Listens to all three `*_DELIVERED` event types and appends an [`AuditRecord`] for each,
/// emitting a `DELIVERY_COMPLETED` event in turn.
pub struct AuditOrgan {
    listens_to: Vec<String>,
    log: Mutex<Vec<AuditRecord>>,
}

impl Default for AuditOrgan {
    fn default() -> Self {
        Self {
            listens_to: vec![
                "EMAIL_DELIVERED".to_string(),
                "SMS_DELIVERED".to_string(),
                "PUSH_DELIVERED".to_string(),
            ],
            log: Mutex::new(Vec::new()),
        }
    }
}

impl AuditOrgan {
    /// A snapshot of every delivery recorded so far.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.log.lock().expect("audit log lock poisoned").clone()
    }
}

fn channel_for(event_type: &str) -> Option<&'static str> {
    match event_type {
        "EMAIL_DELIVERED" => Some("email"),
        "SMS_DELIVERED" => Some("sms"),
        "PUSH_DELIVERED" => Some("push"),
        _ => None,
    }
}

#[async_trait]
impl Organ for AuditOrgan {
    fn listens_to(&self) -> &[String] {
        &self.listens_to
    }

    async fn handle(&self, event: &Event) -> Result<HandlerOutcome, HandlerError> {
        let p = event.payload();
        let user_id = p
            .get("user_id")
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::from("user_id is required"))?
            .to_string();

        let channel = channel_for(event.event_type()).unwrap_or("unknown");

        self.log.lock().expect("audit log lock poisoned").push(AuditRecord {
            user_id: user_id.clone(),
            channel: channel.to_string(),
            event_id: event.id().to_string(),
        });

        let audit_id = format!("audit_{}", &event.id()[..8]);
        let completed = Event::new(
            "DELIVERY_COMPLETED",
            payload(vec![
                ("user_id", Value::String(user_id)),
                ("channel", Value::String(channel.to_string())),
                ("status", Value::String("delivered".to_string())),
                ("audit_id", Value::String(audit_id)),
                ("recorded_at", Value::String(Utc::now().to_rfc3339())),
            ]),
        )
        .map_err(|e| HandlerError::from(e.to_string()))?;

        Ok(HandlerOutcome::Single(completed))
    }
}

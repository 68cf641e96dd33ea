//! Notification pipeline demo: validates a batch of seeded notification requests, routes each to
//! its requested channels, delivers over simulated email/SMS/push transports, and audits every
//! delivery.
//!
//! Run with `cargo run -p notification-router`.

mod organs;

use anyhow::Result;
use organs::{AuditOrgan, EmailOrgan, PushOrgan, RouterOrgan, SmsOrgan, ValidateOrgan};
use serde_json::{json, Map, Value};
use spine_core::event::Event;
use spine_core::organ::Organ;
use spine_runtime::config::SpineConfig;
use spine_runtime::policy::{EnqueueFailureMode, HandlerFailureMode};
use spine_runtime::spine::Spine;
use spine_testing::AutoStopBackend;
use std::sync::Arc;
use std::time::Duration;

fn payload(pairs: Vec<(&str, Value)>) -> Map<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn test_notifications() -> Result<Vec<Event>> {
    let notifications = vec![
        Event::new(
            "NOTIFICATION_REQUESTED",
            payload(vec![
                ("user_id", json!("user_001")),
                ("channels", json!(["email", "sms", "push"])),
                ("message", json!("Your order has shipped and is on its way.")),
                ("priority", json!("high")),
            ]),
        ),
        Event::new(
            "NOTIFICATION_REQUESTED",
            payload(vec![
                ("user_id", json!("user_002")),
                ("channels", json!(["email"])),
                ("message", json!("Your weekly digest is ready.")),
                ("priority", json!("low")),
            ]),
        ),
        Event::new(
            "NOTIFICATION_REQUESTED",
            payload(vec![
                ("user_id", json!("user_003")),
                ("channels", json!(["sms", "push"])),
                ("message", json!("Unusual sign-in detected on your account.")),
                ("priority", json!("critical")),
            ]),
        ),
        Event::new(
            "NOTIFICATION_REQUESTED",
            payload(vec![
                ("user_id", json!("user_001")),
                ("channels", json!(["email"])),
                ("message", json!("")),
                ("priority", json!("normal")),
            ]),
        ),
        Event::new(
            "NOTIFICATION_REQUESTED",
            payload(vec![
                ("user_id", json!("user_002")),
                ("channels", json!(["telegram"])),
                ("message", json!("This channel does not exist.")),
                ("priority", json!("normal")),
            ]),
        ),
    ];
    notifications
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .map_err(anyhow::Error::from)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let audit = Arc::new(AuditOrgan::default());
    let organs: Vec<Arc<dyn Organ>> = vec![
        Arc::new(ValidateOrgan::default()),
        Arc::new(RouterOrgan::default()),
        Arc::new(EmailOrgan::default()),
        Arc::new(SmsOrgan::default()),
        Arc::new(PushOrgan::default()),
        audit.clone(),
    ];

    let backend = Arc::new(AutoStopBackend::new(Duration::from_millis(200)));
    let config = SpineConfig::builder()
        .max_steps(500)
        .enqueue_failure_mode(EnqueueFailureMode::Store)
        .handler_failure_mode(HandlerFailureMode::Store)
        .build();

    let spine = Arc::new(Spine::new(organs, backend.clone(), config)?);
    backend.bind(&spine);

    for event in test_notifications()? {
        backend.enqueue(event).await?;
    }

    let stats = spine.run(None).await?;

    println!("=== notification pipeline run complete ===");
    println!("events processed: {}", stats.events_processed);
    println!("events emitted:   {}", stats.events_emitted);
    if !stats.handler_errors.is_empty() {
        println!("handler errors:");
        for (organ, count) in &stats.handler_errors {
            println!("  {organ}: {count}");
        }
    }

    let failed = spine.failed_event_store();
    let entries = failed.entries();
    println!("\n=== dead letters ({}) ===", entries.len());
    for entry in &entries {
        println!(
            "  [{}] {:?} -> {}",
            entry.event.event_type(),
            entry.event.payload(),
            entry.reason
        );
    }

    let records = audit.records();
    println!("\n=== audit log ({}) ===", records.len());
    for record in &records {
        println!("  {} delivered over {}", record.user_id, record.channel);
    }

    Ok(())
}

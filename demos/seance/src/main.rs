//! Séance demo: a mystical four-stage pipeline showcasing the auto-stop backend pattern.
//!
//! Event chain: `SUMMON_RITUAL` -> `SPIRIT_APPEARED` -> `ANSWER_GENERATED` -> `OMEN_REVEALED` ->
//! `SEANCE_COMPLETE`.
//!
//! Run with `cargo run -p seance`.

mod organs;

use anyhow::Result;
use organs::{AskQuestion, InterpretResponse, ManifestEffect, SummonSpirit};
use serde_json::{json, Map, Value};
use spine_core::event::Event;
use spine_core::organ::Organ;
use spine_runtime::config::SpineConfig;
use spine_runtime::spine::Spine;
use spine_testing::AutoStopBackend;
use std::sync::Arc;
use std::time::Duration;

fn payload(pairs: Vec<(&str, Value)>) -> Map<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    println!("Beginning the Séance...");

    let organs: Vec<Arc<dyn Organ>> = vec![
        Arc::new(SummonSpirit::default()),
        Arc::new(AskQuestion::default()),
        Arc::new(InterpretResponse::default()),
        Arc::new(ManifestEffect::default()),
    ];

    let backend = Arc::new(AutoStopBackend::new(Duration::from_millis(200)));
    let config = SpineConfig::builder().max_steps(100).build();

    let spine = Arc::new(Spine::new(organs, backend.clone(), config)?);
    backend.bind(&spine);

    let start_event = Event::new(
        "SUMMON_RITUAL",
        payload(vec![
            ("ritual", json!("Midnight Invocation")),
            ("spirit_name", json!("Ancient One")),
            ("question", json!("What wisdom do you bring?")),
        ]),
    )?;

    let stats = spine.run(Some(start_event)).await?;

    println!("events processed: {}", stats.events_processed);
    println!("events emitted:   {}", stats.events_emitted);

    Ok(())
}

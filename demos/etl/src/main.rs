//! ETL demo: extracts an embedded CSV sample, cleans and normalizes it, computes per-column
//! numeric statistics, and prints a summary.
//!
//! Event chain: `ETL_START` -> `RAW_DATA_LOADED` -> `DATA_CLEANED` -> `DATA_TRANSFORMED` ->
//! `ETL_COMPLETE`.
//!
//! Run with `cargo run -p etl`.

mod organs;

use anyhow::Result;
use organs::{CleanData, ExportSummary, ExtractCsv, TransformData};
use serde_json::{json, Map, Value};
use spine_core::event::Event;
use spine_core::organ::Organ;
use spine_runtime::config::SpineConfig;
use spine_runtime::spine::Spine;
use spine_testing::AutoStopBackend;
use std::sync::Arc;
use std::time::Duration;

const SAMPLE_CSV_DATA: &str = "\
name,age,salary,department
Alice,30,75000,Engineering
Bob,25,55000,Marketing
Charlie,35,85000,Engineering
Diana,28,62000,Sales
Eve,32,78000,Engineering
Frank,,45000,Marketing
Grace,29,67000,Sales
Henry,40,95000,Engineering
Ivy,27,58000,Marketing
Jack,33,72000,Sales
";

fn payload(pairs: Vec<(&str, Value)>) -> Map<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    println!("Starting ETL Pipeline...\n");

    let organs: Vec<Arc<dyn Organ>> = vec![
        Arc::new(ExtractCsv::default()),
        Arc::new(CleanData::default()),
        Arc::new(TransformData::default()),
        Arc::new(ExportSummary::default()),
    ];

    let backend = Arc::new(AutoStopBackend::new(Duration::from_millis(200)));
    let config = SpineConfig::builder().max_steps(100).build();

    let spine = Arc::new(Spine::new(organs, backend.clone(), config)?);
    backend.bind(&spine);

    let start_event = Event::new(
        "ETL_START",
        payload(vec![
            ("csv_data", json!(SAMPLE_CSV_DATA)),
            ("source_name", json!("employees.csv")),
        ]),
    )?;

    let stats = spine.run(Some(start_event)).await?;

    println!("\n=== ETL run complete ===");
    println!("events processed: {}", stats.events_processed);
    println!("events emitted:   {}", stats.events_emitted);

    Ok(())
}

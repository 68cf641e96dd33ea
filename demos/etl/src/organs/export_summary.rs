//! `DATA_TRANSFORMED` -> `ETL_COMPLETE`.
//!
//! Terminal organ: prints a human-readable summary and emits a completion event. The dispatcher
//! itself never needs a callback/`stop()` hook like the Python original's dual signaling — demo
//! binaries bind an `AutoStopBackend` instead, which stops the spine once the queue has drained.

use super::payload;
use async_trait::async_trait;
use serde_json::Value;
use spine_core::event::Event;
use spine_core::organ::{HandlerError, HandlerOutcome, Organ};
use std::sync::Mutex;

/// Prints a summary of the transformed dataset and emits `ETL_COMPLETE`.
pub struct ExportSummary {
    listens_to: Vec<String>,
    last_summary: Mutex<Option<String>>,
}

impl Default for ExportSummary {
    fn default() -> Self {
        Self {
            listens_to: vec!["DATA_TRANSFORMED".to_string()],
            last_summary: Mutex::new(None),
        }
    }
}

impl ExportSummary {
    /// The most recently printed summary, if any event has been processed yet.
    #[must_use]
    pub fn last_summary(&self) -> Option<String> {
        self.last_summary.lock().expect("export summary lock poisoned").clone()
    }
}

fn format_stat(stats: &Value, key: &str) -> String {
    stats.get(key).and_then(Value::as_f64).map_or_else(|| "N/A".to_string(), |v| format!("{v:.2}"))
}

fn build_summary(source_name: &str, row_count: u64, headers: &[String], numeric_stats: &Value) -> String {
    let mut lines = vec![
        format!("=== ETL Summary for '{source_name}' ==="),
        format!("Total rows processed: {row_count}"),
        format!("Columns: {}", headers.join(", ")),
    ];

    if let Some(stats_obj) = numeric_stats.as_object() {
        if !stats_obj.is_empty() {
            lines.push(String::new());
            lines.push("Numeric Statistics:".to_string());
            for (field, stats) in stats_obj {
                lines.push(format!(
                    "  {field}: min={}, max={}, avg={}, sum={}",
                    format_stat(stats, "min"),
                    format_stat(stats, "max"),
                    format_stat(stats, "avg"),
                    format_stat(stats, "sum"),
                ));
            }
        }
    }

    lines.join("\n")
}

#[async_trait]
impl Organ for ExportSummary {
    fn listens_to(&self) -> &[String] {
        &self.listens_to
    }

    async fn handle(&self, event: &Event) -> Result<HandlerOutcome, HandlerError> {
        let p = event.payload();
        let source_name = p.get("source_name").and_then(Value::as_str).unwrap_or("unknown").to_string();
        let row_count = p.get("row_count").and_then(Value::as_u64).unwrap_or(0);
        let headers: Vec<String> = p
            .get("headers")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|h| h.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let numeric_stats = p.get("numeric_stats").cloned().unwrap_or(Value::Null);

        let summary = build_summary(&source_name, row_count, &headers, &numeric_stats);
        println!("{summary}");
        *self.last_summary.lock().expect("export summary lock poisoned") = Some(summary);

        let complete = Event::new(
            "ETL_COMPLETE",
            payload(vec![
                ("source_name", Value::String(source_name)),
                ("row_count", Value::from(row_count)),
            ]),
        )
        .map_err(|e| HandlerError::from(e.to_string()))?;

        Ok(HandlerOutcome::Single(complete))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn records_summary_and_emits_completion() {
        let organ = ExportSummary::default();
        let event = Event::new(
            "DATA_TRANSFORMED",
            payload(vec![
                ("source_name", json!("people.csv")),
                ("row_count", json!(2)),
                ("headers", json!(["name", "age"])),
                ("numeric_stats", json!({"age": {"min": 25.0, "max": 30.0, "avg": 27.5, "sum": 55.0}})),
            ]),
        )
        .expect("should construct");

        let outcome = organ.handle(&event).await.expect("should succeed");
        let HandlerOutcome::Single(complete) = outcome else {
            panic!("expected a single event");
        };
        assert_eq!(complete.event_type(), "ETL_COMPLETE");
        assert!(organ.last_summary().unwrap().contains("Total rows processed: 2"));
    }
}

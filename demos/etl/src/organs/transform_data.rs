//! `DATA_CLEANED` -> `DATA_TRANSFORMED`.

use super::payload;
use async_trait::async_trait;
use serde_json::{Map, Value};
use spine_core::event::Event;
use spine_core::organ::{HandlerError, HandlerOutcome, Organ};

/// Computes `min`/`max`/`sum`/`avg`/`count` for every header whose values parse as numbers across
/// the cleaned records.
pub struct TransformData {
    listens_to: Vec<String>,
}

impl Default for TransformData {
    fn default() -> Self {
        Self {
            listens_to: vec!["DATA_CLEANED".to_string()],
        }
    }
}

fn numeric_value(record: &Value, header: &str) -> Option<f64> {
    let value = record.as_object()?.get(header)?;
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn stats_for(records: &[Value], header: &str) -> Option<Value> {
    let values: Vec<f64> = records.iter().filter_map(|r| numeric_value(r, header)).collect();
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().sum();
    let count = values.len();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut stats = Map::new();
    stats.insert("min".to_string(), Value::from(min));
    stats.insert("max".to_string(), Value::from(max));
    stats.insert("sum".to_string(), Value::from(sum));
    stats.insert("avg".to_string(), Value::from(sum / count as f64));
    stats.insert("count".to_string(), Value::from(count));
    Some(Value::Object(stats))
}

#[async_trait]
impl Organ for TransformData {
    fn listens_to(&self) -> &[String] {
        &self.listens_to
    }

    async fn handle(&self, event: &Event) -> Result<HandlerOutcome, HandlerError> {
        let p = event.payload();
        let source_name = p.get("source_name").and_then(Value::as_str).unwrap_or("unknown").to_string();
        let headers = p.get("headers").and_then(Value::as_array).cloned().unwrap_or_default();
        let records = p.get("records").and_then(Value::as_array).cloned().unwrap_or_default();
        let row_count = records.len();

        let header_names: Vec<String> = headers.iter().filter_map(|h| h.as_str().map(str::to_string)).collect();
        let numeric_stats: Map<String, Value> = header_names
            .iter()
            .filter_map(|header| stats_for(&records, header).map(|stats| (header.clone(), stats)))
            .collect();

        let transformed = Event::new(
            "DATA_TRANSFORMED",
            payload(vec![
                ("source_name", Value::String(source_name)),
                ("headers", Value::Array(headers)),
                ("records", Value::Array(records)),
                ("row_count", Value::from(row_count)),
                ("numeric_stats", Value::Object(numeric_stats)),
            ]),
        )
        .map_err(|e| HandlerError::from(e.to_string()))?;

        Ok(HandlerOutcome::Single(transformed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn computes_numeric_stats_per_header() {
        let organ = TransformData::default();
        let event = Event::new(
            "DATA_CLEANED",
            payload(vec![
                ("source_name", json!("people.csv")),
                ("headers", json!(["name", "age"])),
                (
                    "records",
                    json!([
                        {"name": "alice", "age": "30"},
                        {"name": "bob", "age": "25"},
                    ]),
                ),
            ]),
        )
        .expect("should construct");

        let outcome = organ.handle(&event).await.expect("should succeed");
        let HandlerOutcome::Single(transformed) = outcome else {
            panic!("expected a single event");
        };
        let stats = transformed.payload().get("numeric_stats").unwrap();
        assert_eq!(stats["age"]["min"], json!(25.0));
        assert_eq!(stats["age"]["max"], json!(30.0));
        assert_eq!(stats["age"]["count"], json!(2));
        assert!(stats.get("name").is_none());
    }
}

//! `RAW_DATA_LOADED` -> `DATA_CLEANED`.

use super::payload;
use async_trait::async_trait;
use serde_json::{Map, Value};
use spine_core::event::Event;
use spine_core::organ::{HandlerError, HandlerOutcome, Organ};

/// Drops records that carry any empty or null field, and normalizes the remaining string values
/// (trim, lowercase).
pub struct CleanData {
    listens_to: Vec<String>,
}

impl Default for CleanData {
    fn default() -> Self {
        Self {
            listens_to: vec!["RAW_DATA_LOADED".to_string()],
        }
    }
}

fn is_blank(value: &Value) -> bool {
    matches!(value, Value::Null) || matches!(value, Value::String(s) if s.is_empty())
}

fn clean_record(record: &Map<String, Value>) -> Map<String, Value> {
    record
        .iter()
        .map(|(key, value)| {
            let cleaned = match value {
                Value::String(s) => Value::String(s.trim().to_lowercase()),
                other => other.clone(),
            };
            (key.clone(), cleaned)
        })
        .collect()
}

#[async_trait]
impl Organ for CleanData {
    fn listens_to(&self) -> &[String] {
        &self.listens_to
    }

    async fn handle(&self, event: &Event) -> Result<HandlerOutcome, HandlerError> {
        let p = event.payload();
        let source_name = p.get("source_name").and_then(Value::as_str).unwrap_or("unknown").to_string();
        let headers = p.get("headers").and_then(Value::as_array).cloned().unwrap_or_default();
        let records = p.get("records").and_then(Value::as_array).cloned().unwrap_or_default();

        let mut cleaned_records = Vec::new();
        let mut removed_count: u64 = 0;

        for record in &records {
            let Some(record) = record.as_object() else {
                removed_count += 1;
                continue;
            };
            if record.values().any(is_blank) {
                removed_count += 1;
                continue;
            }
            cleaned_records.push(Value::Object(clean_record(record)));
        }

        let row_count = cleaned_records.len();
        let cleaned = Event::new(
            "DATA_CLEANED",
            payload(vec![
                ("source_name", Value::String(source_name)),
                ("headers", Value::Array(headers)),
                ("records", Value::Array(cleaned_records)),
                ("row_count", Value::from(row_count)),
                ("removed_count", Value::from(removed_count)),
            ]),
        )
        .map_err(|e| HandlerError::from(e.to_string()))?;

        Ok(HandlerOutcome::Single(cleaned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn drops_records_with_empty_values_and_normalizes_strings() {
        let organ = CleanData::default();
        let event = Event::new(
            "RAW_DATA_LOADED",
            payload(vec![
                ("source_name", json!("people.csv")),
                ("headers", json!(["name", "age"])),
                (
                    "records",
                    json!([
                        {"name": "  Alice ", "age": "30"},
                        {"name": "Bob", "age": ""},
                    ]),
                ),
            ]),
        )
        .expect("should construct");

        let outcome = organ.handle(&event).await.expect("should succeed");
        let HandlerOutcome::Single(cleaned) = outcome else {
            panic!("expected a single event");
        };
        assert_eq!(cleaned.payload().get("row_count"), Some(&json!(1)));
        assert_eq!(cleaned.payload().get("removed_count"), Some(&json!(1)));
        let records = cleaned.payload().get("records").and_then(Value::as_array).unwrap();
        assert_eq!(records[0]["name"], json!("alice"));
    }
}

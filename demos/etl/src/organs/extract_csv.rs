//! `ETL_START` -> `RAW_DATA_LOADED`.

use super::payload;
use async_trait::async_trait;
use serde_json::Value;
use spine_core::event::Event;
use spine_core::organ::{HandlerError, HandlerOutcome, Organ};

/// Parses the CSV data embedded in an `ETL_START` event's payload into header/record rows.
///
/// A blank `csv_data` (after trimming) yields an empty `RAW_DATA_LOADED` event rather than an
/// error, matching the original loader's treatment of an empty source as zero rows instead of a
/// malformed one.
pub struct ExtractCsv {
    listens_to: Vec<String>,
}

impl Default for ExtractCsv {
    fn default() -> Self {
        Self {
            listens_to: vec!["ETL_START".to_string()],
        }
    }
}

fn parse_csv(csv_data: &str) -> (Vec<String>, Vec<Value>) {
    let stripped = csv_data.trim();
    if stripped.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let mut lines = stripped.lines();
    let headers: Vec<String> = lines.next().map_or_else(Vec::new, |header_line| {
        header_line.split(',').map(|h| h.trim().to_string()).collect()
    });

    let records = lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let values: Vec<&str> = line.split(',').map(str::trim).collect();
            let record: serde_json::Map<String, Value> = headers
                .iter()
                .zip(values)
                .map(|(header, value)| (header.clone(), Value::String(value.to_string())))
                .collect();
            Value::Object(record)
        })
        .collect();

    (headers, records)
}

#[async_trait]
impl Organ for ExtractCsv {
    fn listens_to(&self) -> &[String] {
        &self.listens_to
    }

    async fn handle(&self, event: &Event) -> Result<HandlerOutcome, HandlerError> {
        let p = event.payload();
        let csv_data = p.get("csv_data").and_then(Value::as_str).unwrap_or("");
        let source_name = p.get("source_name").and_then(Value::as_str).unwrap_or("unknown").to_string();

        let (headers, records) = parse_csv(csv_data);
        let row_count = records.len();

        let loaded = Event::new(
            "RAW_DATA_LOADED",
            payload(vec![
                ("source_name", Value::String(source_name)),
                ("headers", Value::Array(headers.into_iter().map(Value::String).collect())),
                ("records", Value::Array(records)),
                ("row_count", Value::from(row_count)),
            ]),
        )
        .map_err(|e| HandlerError::from(e.to_string()))?;

        Ok(HandlerOutcome::Single(loaded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn parses_header_and_rows() {
        let organ = ExtractCsv::default();
        let event = Event::new(
            "ETL_START",
            payload(vec![
                ("csv_data", json!("name,age\nAlice,30\nBob,25\n")),
                ("source_name", json!("people.csv")),
            ]),
        )
        .expect("should construct");

        let outcome = organ.handle(&event).await.expect("should succeed");
        let HandlerOutcome::Single(loaded) = outcome else {
            panic!("expected a single event");
        };
        assert_eq!(loaded.event_type(), "RAW_DATA_LOADED");
        assert_eq!(loaded.payload().get("row_count"), Some(&json!(2)));
        assert_eq!(loaded.payload().get("headers"), Some(&json!(["name", "age"])));
    }

    #[tokio::test]
    async fn blank_csv_data_yields_zero_rows() {
        let organ = ExtractCsv::default();
        let event = Event::new("ETL_START", payload(vec![("csv_data", json!("   "))])).expect("should construct");
        let outcome = organ.handle(&event).await.expect("should succeed");
        let HandlerOutcome::Single(loaded) = outcome else {
            panic!("expected a single event");
        };
        assert_eq!(loaded.payload().get("row_count"), Some(&json!(0)));
    }
}

//! `OMEN_REVEALED` -> `SEANCE_COMPLETE`.
//!
//! Terminal organ: prints the final output and emits a completion event. Like the ETL demo's
//! `ExportSummary`, completion is observed via `AutoStopBackend` rather than a callback/`stop()`
//! hook passed into the organ.

use super::payload;
use async_trait::async_trait;
use serde_json::Value;
use spine_core::event::Event;
use spine_core::organ::{HandlerError, HandlerOutcome, Organ};
use std::sync::Mutex;

/// Prints the revealed omen and its interpretation, then emits `SEANCE_COMPLETE`.
pub struct ManifestEffect {
    listens_to: Vec<String>,
    last_output: Mutex<Option<String>>,
}

impl Default for ManifestEffect {
    fn default() -> Self {
        Self {
            listens_to: vec!["OMEN_REVEALED".to_string()],
            last_output: Mutex::new(None),
        }
    }
}

impl ManifestEffect {
    /// The most recently printed output, if any event has been processed yet.
    #[must_use]
    pub fn last_output(&self) -> Option<String> {
        self.last_output.lock().expect("manifest effect lock poisoned").clone()
    }
}

#[async_trait]
impl Organ for ManifestEffect {
    fn listens_to(&self) -> &[String] {
        &self.listens_to
    }

    async fn handle(&self, event: &Event) -> Result<HandlerOutcome, HandlerError> {
        let p = event.payload();
        let spirit_name = p.get("spirit_name").and_then(Value::as_str).unwrap_or("Unknown Spirit").to_string();
        let omen = p.get("omen").and_then(Value::as_str).unwrap_or("No omen revealed").to_string();
        let interpretation = p.get("interpretation").and_then(Value::as_str).unwrap_or("").to_string();

        let border = "=".repeat(50);
        let output = format!(
            "\n{border}\nSEANCE COMPLETE\n{border}\nSpirit: {spirit_name}\nOmen: {omen}\nInterpretation: {interpretation}\n{border}\n"
        );

        println!("{output}");
        *self.last_output.lock().expect("manifest effect lock poisoned") = Some(output);

        let complete = Event::new(
            "SEANCE_COMPLETE",
            payload(vec![
                ("spirit_name", Value::String(spirit_name)),
                ("omen", Value::String(omen)),
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
    async fn prints_and_records_output_then_emits_completion() {
        let organ = ManifestEffect::default();
        let event = Event::new(
            "OMEN_REVEALED",
            payload(vec![
                ("spirit_name", json!("Ancient One")),
                ("omen", json!("A great change approaches.")),
                ("interpretation", json!("Patience.")),
            ]),
        )
        .expect("should construct");

        let outcome = organ.handle(&event).await.expect("should succeed");
        let HandlerOutcome::Single(complete) = outcome else {
            panic!("expected a single event");
        };
        assert_eq!(complete.event_type(), "SEANCE_COMPLETE");
        assert!(organ.last_output().unwrap().contains("Ancient One"));
    }
}

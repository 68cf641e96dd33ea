//! `ANSWER_GENERATED` -> `OMEN_REVEALED`.

use super::payload;
use async_trait::async_trait;
use serde_json::Value;
use spine_core::event::Event;
use spine_core::organ::{HandlerError, HandlerOutcome, Organ};

/// Interprets the spirit's answer into a fixed omen and interpretation, referencing a short
/// excerpt of the original answer for flavor.
pub struct InterpretResponse {
    listens_to: Vec<String>,
}

impl Default for InterpretResponse {
    fn default() -> Self {
        Self {
            listens_to: vec!["ANSWER_GENERATED".to_string()],
        }
    }
}

fn excerpt(answer: &str, max_chars: usize) -> String {
    if answer.chars().count() > max_chars {
        let truncated: String = answer.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        answer.to_string()
    }
}

#[async_trait]
impl Organ for InterpretResponse {
    fn listens_to(&self) -> &[String] {
        &self.listens_to
    }

    async fn handle(&self, event: &Event) -> Result<HandlerOutcome, HandlerError> {
        let p = event.payload();
        let spirit_name = p.get("spirit_name").and_then(Value::as_str).unwrap_or("Unknown Spirit").to_string();
        let answer = p.get("answer").and_then(Value::as_str).unwrap_or("").to_string();

        // TODO: replace with interpretation logic that actually analyzes the answer's content.
        let omen = format!("The words of {spirit_name} foretell: A great change approaches.");
        let interpretation = if answer.is_empty() {
            "The spirits suggest patience and vigilance.".to_string()
        } else {
            format!("The spirits suggest patience and vigilance. (Based on: {})", excerpt(&answer, 50))
        };

        let revealed = Event::new(
            "OMEN_REVEALED",
            payload(vec![
                ("spirit_name", Value::String(spirit_name)),
                ("original_answer", Value::String(answer)),
                ("omen", Value::String(omen)),
                ("interpretation", Value::String(interpretation)),
            ]),
        )
        .map_err(|e| HandlerError::from(e.to_string()))?;

        Ok(HandlerOutcome::Single(revealed))
    }
}

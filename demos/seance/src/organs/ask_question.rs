//! `SPIRIT_APPEARED` -> `ANSWER_GENERATED`.

use super::payload;
use async_trait::async_trait;
use serde_json::Value;
use spine_core::event::Event;
use spine_core::organ::{HandlerError, HandlerOutcome, Organ};

/// Asks the summoned spirit the question carried on the event and returns a fixed, atmospheric
/// answer.
pub struct AskQuestion {
    listens_to: Vec<String>,
}

impl Default for AskQuestion {
    fn default() -> Self {
        Self {
            listens_to: vec!["SPIRIT_APPEARED".to_string()],
        }
    }
}

#[async_trait]
impl Organ for AskQuestion {
    fn listens_to(&self) -> &[String] {
        &self.listens_to
    }

    async fn handle(&self, event: &Event) -> Result<HandlerOutcome, HandlerError> {
        let p = event.payload();
        let spirit_name = p.get("spirit_name").and_then(Value::as_str).unwrap_or("Unknown Spirit").to_string();
        let question = p
            .get("question")
            .and_then(Value::as_str)
            .unwrap_or("What wisdom do you bring?")
            .to_string();

        // TODO: replace with an actual generative responder; this is a fixed placeholder answer.
        let answer = format!(
            "The {spirit_name} speaks in response to '{question}': \
             'The path you seek lies within shadows and light.'"
        );

        let generated = Event::new(
            "ANSWER_GENERATED",
            payload(vec![
                ("spirit_name", Value::String(spirit_name)),
                ("question", Value::String(question)),
                ("answer", Value::String(answer)),
            ]),
        )
        .map_err(|e| HandlerError::from(e.to_string()))?;

        Ok(HandlerOutcome::Single(generated))
    }
}

//! `SUMMON_RITUAL` -> `SPIRIT_APPEARED`.

use super::payload;
use async_trait::async_trait;
use serde_json::Value;
use spine_core::event::Event;
use spine_core::organ::{HandlerError, HandlerOutcome, Organ};

/// Summons a spirit named by the ritual event, defaulting to "Ancient One" if none is given.
pub struct SummonSpirit {
    listens_to: Vec<String>,
}

impl Default for SummonSpirit {
    fn default() -> Self {
        Self {
            listens_to: vec!["SUMMON_RITUAL".to_string()],
        }
    }
}

#[async_trait]
impl Organ for SummonSpirit {
    fn listens_to(&self) -> &[String] {
        &self.listens_to
    }

    async fn handle(&self, event: &Event) -> Result<HandlerOutcome, HandlerError> {
        let p = event.payload();
        let ritual = p.get("ritual").and_then(Value::as_str).unwrap_or("unknown ritual").to_string();
        let spirit_name = p.get("spirit_name").and_then(Value::as_str).unwrap_or("Ancient One").to_string();
        let question = p
            .get("question")
            .and_then(Value::as_str)
            .unwrap_or("What wisdom do you bring?")
            .to_string();

        let message = format!("The spirit '{spirit_name}' has been summoned through {ritual}.");

        let appeared = Event::new(
            "SPIRIT_APPEARED",
            payload(vec![
                ("spirit_name", Value::String(spirit_name)),
                ("summoned_by", Value::String(ritual)),
                ("question", Value::String(question)),
                ("message", Value::String(message)),
            ]),
        )
        .map_err(|e| HandlerError::from(e.to_string()))?;

        Ok(HandlerOutcome::Single(appeared))
    }
}

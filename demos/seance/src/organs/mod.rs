//! The séance pipeline's organs, one module per pipeline stage.
//!
//! `SUMMON_RITUAL` -> `SPIRIT_APPEARED` -> `ANSWER_GENERATED` -> `OMEN_REVEALED` ->
//! `SEANCE_COMPLETE`.

mod ask_question;
mod interpret_response;
mod manifest_effect;
mod summon_spirit;

pub use ask_question::AskQuestion;
pub use interpret_response::InterpretResponse;
pub use manifest_effect::ManifestEffect;
pub use summon_spirit::SummonSpirit;

use serde_json::{Map, Value};

/// Build a JSON payload object from `(key, value)` pairs, in order.
pub(crate) fn payload(pairs: Vec<(&str, Value)>) -> Map<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

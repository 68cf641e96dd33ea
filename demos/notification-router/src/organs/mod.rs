//! The notification pipeline's organs, one module per pipeline stage.
//!
//! `NOTIFICATION_REQUESTED` -> `NOTIFICATION_VALIDATED` -> `{EMAIL,SMS,PUSH}_SEND_REQUESTED` ->
//! `{EMAIL,SMS,PUSH}_DELIVERED` -> `DELIVERY_COMPLETED`, with `NOTIFICATION_FAILED` branching off
//! validation and individual delivery failures going to the dead-letter store.

mod audit;
mod email;
mod push;
mod router;
mod sms;
mod validate;

pub use audit::AuditOrgan;
pub use email::EmailOrgan;
pub use push::PushOrgan;
pub use router::RouterOrgan;
pub use sms::SmsOrgan;
pub use validate::ValidateOrgan;

use serde_json::{Map, Value};

/// Build a JSON payload object from `(key, value)` pairs, in order.
pub(crate) fn payload(pairs: Vec<(&str, Value)>) -> Map<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

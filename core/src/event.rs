//! The `Event` value type.
//!
//! An event is an immutable, validated message that flows through the dispatcher. Unlike the
//! generic `Event` trait a pure event-sourcing core would define, the dispatcher works with one
//! concrete struct: every organ receives and returns the same `Event` type, routed purely by its
//! `event_type` field.
//!
//! # Wire format
//!
//! Events serialize to a JSON object with four fields: `id`, `timestamp` (ISO-8601), `event_type`,
//! `payload`. Unknown fields are rejected on the way in (`#[serde(deny_unknown_fields)]`), and the
//! round trip `parse(serialize(e)) == e` holds for every validly constructed event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Maximum serialized payload size, in bytes: 1 MiB.
pub const MAX_PAYLOAD_BYTES: usize = 1_048_576;

/// Reasons an `Event` failed to construct.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The supplied `id` was not a valid version-4 UUID.
    #[error("invalid event id {0:?}: not a valid UUIDv4")]
    InvalidId(String),

    /// `event_type` was empty, or entirely whitespace.
    #[error("event_type must not be empty or whitespace-only")]
    EmptyEventType,

    /// The payload could not be serialized to JSON.
    #[error("payload is not JSON-serializable: {0}")]
    UnserializablePayload(String),

    /// The serialized payload exceeded [`MAX_PAYLOAD_BYTES`].
    #[error("payload size {actual} bytes exceeds the {MAX_PAYLOAD_BYTES}-byte limit")]
    PayloadTooLarge {
        /// The actual serialized size, in bytes.
        actual: usize,
    },

    /// The wire representation contained fields other than `id`, `timestamp`, `event_type`,
    /// `payload`, or was shaped incorrectly (e.g. `payload` not an object).
    #[error("malformed event representation: {0}")]
    MalformedWireFormat(String),
}

/// An immutable, validated message routed through the dispatcher.
///
/// Construct with [`Event::new`] (auto-generates `id`/`timestamp`) or [`Event::with_id`] /
/// [`Event::with_timestamp`] when a caller needs to supply either explicitly (e.g. replaying a
/// previously-serialized event). All constructors enforce the same invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    id: String,
    timestamp: DateTime<Utc>,
    event_type: String,
    payload: Map<String, Value>,
}

/// Wire-format mirror of [`Event`], used only for `deny_unknown_fields` validation on parse.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct EventWire {
    id: String,
    timestamp: DateTime<Utc>,
    event_type: String,
    #[serde(default)]
    payload: Map<String, Value>,
}

impl Event {
    /// Construct a new event, auto-generating a lowercase UUIDv4 `id` and a current UTC
    /// `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if `event_type` is empty/whitespace-only, or if `payload`
    /// cannot be serialized to JSON within [`MAX_PAYLOAD_BYTES`].
    pub fn new(
        event_type: impl Into<String>,
        payload: Map<String, Value>,
    ) -> Result<Self, ValidationError> {
        Self::build(Uuid::new_v4().to_string(), Utc::now(), event_type.into(), payload)
    }

    /// Construct a new event with an explicit `id`.
    ///
    /// # Errors
    ///
    /// As [`Event::new`], plus [`ValidationError::InvalidId`] if `id` is not a valid UUIDv4.
    pub fn with_id(
        id: impl Into<String>,
        event_type: impl Into<String>,
        payload: Map<String, Value>,
    ) -> Result<Self, ValidationError> {
        Self::build(id.into(), Utc::now(), event_type.into(), payload)
    }

    /// Construct a new event with explicit `id` and `timestamp`.
    ///
    /// Used when reconstructing an event from a backend's wire representation, where both
    /// fields are already known.
    ///
    /// # Errors
    ///
    /// As [`Event::new`], plus [`ValidationError::InvalidId`] if `id` is not a valid UUIDv4.
    pub fn with_id_and_timestamp(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        event_type: impl Into<String>,
        payload: Map<String, Value>,
    ) -> Result<Self, ValidationError> {
        Self::build(id.into(), timestamp, event_type.into(), payload)
    }

    fn build(
        id: String,
        timestamp: DateTime<Utc>,
        event_type: String,
        payload: Map<String, Value>,
    ) -> Result<Self, ValidationError> {
        let id = validate_id(&id)?;
        if event_type.trim().is_empty() {
            return Err(ValidationError::EmptyEventType);
        }
        validate_payload_size(&payload)?;
        Ok(Self {
            id,
            timestamp,
            event_type,
            payload,
        })
    }

    /// The event's UUIDv4 identifier, normalized to lowercase.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The UTC instant the event was created.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The routing key used by [`crate::organ::Organ::listens_to`].
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The event's payload, as a JSON object.
    #[must_use]
    pub const fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Serialize this event to the canonical wire-format JSON object.
    #[must_use]
    pub fn to_json_object(&self) -> Value {
        let mut obj = Map::with_capacity(4);
        obj.insert("id".to_string(), Value::String(self.id.clone()));
        obj.insert(
            "timestamp".to_string(),
            Value::String(self.timestamp.to_rfc3339()),
        );
        obj.insert(
            "event_type".to_string(),
            Value::String(self.event_type.clone()),
        );
        obj.insert("payload".to_string(), Value::Object(self.payload.clone()));
        Value::Object(obj)
    }

    /// Parse an event from its canonical wire-format JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MalformedWireFormat`] if the value is not a well-formed
    /// `EventWire` object (including unknown fields), or any other [`ValidationError`] the
    /// reconstructed event fails to satisfy.
    pub fn from_json_object(value: &Value) -> Result<Self, ValidationError> {
        let wire: EventWire = serde_json::from_value(value.clone())
            .map_err(|e| ValidationError::MalformedWireFormat(e.to_string()))?;
        Self::with_id_and_timestamp(wire.id, wire.timestamp, wire.event_type, wire.payload)
    }

    /// Serialize this event to a compact JSON string (as sent over the wire by `StreamsBackend`).
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnserializablePayload`] in the (practically unreachable, since
    /// validation already happened at construction) case that serialization fails.
    pub fn to_json_string(&self) -> Result<String, ValidationError> {
        serde_json::to_string(&self.to_json_object())
            .map_err(|e| ValidationError::UnserializablePayload(e.to_string()))
    }

    /// Parse an event from a JSON string produced by [`Event::to_json_string`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MalformedWireFormat`] if `s` is not valid JSON or does not
    /// match the wire shape.
    pub fn from_json_str(s: &str) -> Result<Self, ValidationError> {
        let value: Value =
            serde_json::from_str(s).map_err(|e| ValidationError::MalformedWireFormat(e.to_string()))?;
        Self::from_json_object(&value)
    }
}

fn validate_id(id: &str) -> Result<String, ValidationError> {
    let parsed = Uuid::parse_str(id).map_err(|_| ValidationError::InvalidId(id.to_string()))?;
    if parsed.get_version_num() != 4 {
        return Err(ValidationError::InvalidId(id.to_string()));
    }
    Ok(parsed.to_string())
}

fn validate_payload_size(payload: &Map<String, Value>) -> Result<(), ValidationError> {
    let serialized = serde_json::to_vec(payload)
        .map_err(|e| ValidationError::UnserializablePayload(e.to_string()))?;
    if serialized.len() > MAX_PAYLOAD_BYTES {
        return Err(ValidationError::PayloadTooLarge {
            actual: serialized.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[test]
    fn new_generates_valid_uuid_v4_id() {
        let event = Event::new("order.placed", Map::new()).expect("should construct");
        let parsed = Uuid::parse_str(event.id()).expect("id should be a valid UUID");
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn distinct_events_get_distinct_ids() {
        let a = Event::new("order.placed", Map::new()).expect("should construct");
        let b = Event::new("order.placed", Map::new()).expect("should construct");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn whitespace_only_event_type_is_rejected() {
        let err = Event::new("   ", Map::new()).unwrap_err();
        assert_eq!(err, ValidationError::EmptyEventType);
    }

    #[test]
    fn empty_event_type_is_rejected() {
        let err = Event::new(String::new(), Map::new()).unwrap_err();
        assert_eq!(err, ValidationError::EmptyEventType);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let big = "x".repeat(MAX_PAYLOAD_BYTES + 1);
        let p = payload(&[("blob", Value::String(big))]);
        let err = Event::new("order.placed", p).unwrap_err();
        assert!(matches!(err, ValidationError::PayloadTooLarge { .. }));
    }

    #[test]
    fn invalid_id_is_rejected() {
        let err = Event::with_id("not-a-uuid", "order.placed", Map::new()).unwrap_err();
        assert_eq!(err, ValidationError::InvalidId("not-a-uuid".to_string()));
    }

    #[test]
    fn id_is_normalized_to_lowercase() {
        let uppercase = "550E8400-E29B-41D4-A716-446655440000";
        let event = Event::with_id(uppercase, "order.placed", Map::new()).expect("should construct");
        assert_eq!(event.id(), uppercase.to_lowercase());
    }

    #[test]
    fn round_trip_preserves_all_fields() {
        let p = payload(&[("channel", Value::String("email".to_string()))]);
        let original = Event::new("notification.sent", p).expect("should construct");
        let json = original.to_json_object();
        let parsed = Event::from_json_object(&json).expect("should parse");
        assert_eq!(original, parsed);
    }

    #[test]
    fn round_trip_via_json_string() {
        let original = Event::new("order.placed", Map::new()).expect("should construct");
        let s = original.to_json_string().expect("should serialize");
        let parsed = Event::from_json_str(&s).expect("should parse");
        assert_eq!(original, parsed);
    }

    #[test]
    fn unknown_fields_are_rejected_on_parse() {
        let mut obj = Map::new();
        obj.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        obj.insert(
            "timestamp".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
        obj.insert(
            "event_type".to_string(),
            Value::String("order.placed".to_string()),
        );
        obj.insert("payload".to_string(), Value::Object(Map::new()));
        obj.insert("extra_field".to_string(), Value::Bool(true));

        let err = Event::from_json_object(&Value::Object(obj)).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedWireFormat(_)));
    }

    #[test]
    fn structural_equality_is_field_wise() {
        let p = payload(&[("k", Value::from(1))]);
        let a = Event::with_id_and_timestamp(
            "550e8400-e29b-41d4-a716-446655440000",
            Utc::now(),
            "x",
            p.clone(),
        )
        .expect("should construct");
        let b = Event::with_id_and_timestamp(
            "550e8400-e29b-41d4-a716-446655440000",
            a.timestamp(),
            "x",
            p,
        )
        .expect("should construct");
        assert_eq!(a, b);
    }
}

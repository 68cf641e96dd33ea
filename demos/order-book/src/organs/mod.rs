//! The order book's organs, one module per pipeline stage.
//!
//! `ORDER_SUBMITTED` -> `ORDER_VALIDATED`/`ORDER_REJECTED` -> (matching) `TRADE_EXECUTED` and
//! `ORDER_FILLED`/`ORDER_PARTIAL_FILL`/`ORDER_QUEUED`/`ORDER_REJECTED` -> `SETTLEMENT_COMPLETE` ->
//! `RISK_ALERT`, with every step also flowing into the audit trail.

mod audit_trail;
mod matching_engine;
mod risk_manager;
mod settlement;
mod validate_order;

pub use audit_trail::AuditTrail;
pub use matching_engine::MatchingEngine;
pub use risk_manager::RiskManager;
pub use settlement::SettlementOrgan;
pub use validate_order::ValidateOrder;

use serde_json::{Map, Value};

/// Build a JSON payload object from `(key, value)` pairs, in order.
pub(crate) fn payload(pairs: Vec<(&str, Value)>) -> Map<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

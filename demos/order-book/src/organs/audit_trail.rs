//! `{ORDER_VALIDATED,ORDER_REJECTED,ORDER_FILLED,ORDER_PARTIAL_FILL,ORDER_QUEUED,TRADE_EXECUTED,
//! SETTLEMENT_COMPLETE,RISK_ALERT}` -> (nothing), recording a compliance log entry for each.
//!
//! Terminal organ: unlike the notification pipeline's `AuditOrgan`, this one emits no follow-up
//! event, matching the Python original's `handle` returning `None`.

use async_trait::async_trait;
use serde_json::Value;
use spine_core::event::Event;
use spine_core::organ::{HandlerError, HandlerOutcome, Organ};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Default cap on the in-memory compliance log, matching the Python original's `deque(maxlen=...)`.
pub const DEFAULT_MAX_LOG_SIZE: usize = 100_000;

/// One recorded compliance entry.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    /// The id of the event this record summarizes.
    pub event_id: String,
    /// The event's type.
    pub event_type: String,
    /// A short human-readable summary of the event's payload.
    pub summary: String,
}

/// Per-event-type counters, mirroring the Python original's `self.stats` dict.
#[derive(Debug, Clone, Default)]
pub struct AuditStats {
    /// `ORDER_VALIDATED` count.
    pub orders_validated: u64,
    /// `ORDER_REJECTED` count.
    pub orders_rejected: u64,
    /// `ORDER_FILLED` count.
    pub orders_filled: u64,
    /// `ORDER_PARTIAL_FILL` count.
    pub orders_partial: u64,
    /// `ORDER_QUEUED` count.
    pub orders_queued: u64,
    /// `TRADE_EXECUTED` count.
    pub trades_executed: u64,
    /// `SETTLEMENT_COMPLETE` count.
    pub settlements: u64,
    /// `RISK_ALERT` count.
    pub risk_alerts: u64,
}

struct State {
    log: VecDeque<AuditRecord>,
    stats: AuditStats,
}

/// Records a bounded compliance log across the entire order lifecycle: validation, rejection,
/// matching outcomes, settlement, and risk alerts. Every matching event is logged; none produce
/// a follow-up.
pub struct AuditTrail {
    listens_to: Vec<String>,
    max_log_size: usize,
    state: Mutex<State>,
}

impl AuditTrail {
    /// Build an audit trail bounded to `max_log_size` entries, oldest evicted first.
    #[must_use]
    pub fn new(max_log_size: usize) -> Self {
        Self {
            listens_to: vec![
                "ORDER_VALIDATED".to_string(),
                "ORDER_REJECTED".to_string(),
                "ORDER_FILLED".to_string(),
                "ORDER_PARTIAL_FILL".to_string(),
                "ORDER_QUEUED".to_string(),
                "TRADE_EXECUTED".to_string(),
                "SETTLEMENT_COMPLETE".to_string(),
                "RISK_ALERT".to_string(),
            ],
            max_log_size,
            state: Mutex::new(State {
                log: VecDeque::new(),
                stats: AuditStats::default(),
            }),
        }
    }

    /// A snapshot of every record logged so far, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.state.lock().expect("audit trail lock poisoned").log.iter().cloned().collect()
    }

    /// A snapshot of the per-event-type counters.
    #[must_use]
    pub fn stats(&self) -> AuditStats {
        self.state.lock().expect("audit trail lock poisoned").stats.clone()
    }
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LOG_SIZE)
    }
}

fn summarize(event: &Event) -> String {
    let p = event.payload();
    match event.event_type() {
        "ORDER_VALIDATED" => {
            let side = p.get("side").and_then(Value::as_str).unwrap_or("?");
            let quantity = p.get("quantity").and_then(Value::as_i64).unwrap_or(0);
            let symbol = p.get("symbol").and_then(Value::as_str).unwrap_or("?");
            let price = p
                .get("price")
                .and_then(Value::as_f64)
                .map_or_else(|| "MKT".to_string(), |price| format!("{price:.2}"));
            format!("{side} {quantity} {symbol} @ {price}")
        }
        "ORDER_REJECTED" => {
            let reason = p.get("reason").and_then(Value::as_str).unwrap_or("unknown");
            format!("Rejected: {reason}")
        }
        "ORDER_FILLED" => {
            let quantity = p.get("quantity").and_then(Value::as_i64).unwrap_or(0);
            let symbol = p.get("symbol").and_then(Value::as_str).unwrap_or("?");
            let avg_price = p.get("avg_price").and_then(Value::as_f64).unwrap_or(0.0);
            format!("Filled {quantity} {symbol} @ {avg_price:.2}")
        }
        "ORDER_PARTIAL_FILL" => {
            let filled = p.get("filled_quantity").and_then(Value::as_i64).unwrap_or(0);
            let original = p.get("original_quantity").and_then(Value::as_i64).unwrap_or(0);
            let symbol = p.get("symbol").and_then(Value::as_str).unwrap_or("?");
            format!("Partial {filled}/{original} {symbol}")
        }
        "ORDER_QUEUED" => {
            let side = p.get("side").and_then(Value::as_str).unwrap_or("?");
            let quantity = p.get("quantity").and_then(Value::as_i64).unwrap_or(0);
            let symbol = p.get("symbol").and_then(Value::as_str).unwrap_or("?");
            let price = p
                .get("price")
                .and_then(Value::as_f64)
                .map_or_else(|| "MKT".to_string(), |price| format!("{price:.2}"));
            format!("Queued {side} {quantity} {symbol} @ {price}")
        }
        "TRADE_EXECUTED" => {
            let trade_id = p.get("trade_id").and_then(Value::as_str).unwrap_or("-");
            let quantity = p.get("quantity").and_then(Value::as_i64).unwrap_or(0);
            let symbol = p.get("symbol").and_then(Value::as_str).unwrap_or("?");
            let price = p.get("price").and_then(Value::as_f64).unwrap_or(0.0);
            format!("Trade {trade_id}: {quantity} {symbol} @ {price}")
        }
        "SETTLEMENT_COMPLETE" => {
            let trade_id = p.get("trade_id").and_then(Value::as_str).unwrap_or("-");
            let total = p.get("total_value").and_then(Value::as_f64).unwrap_or(0.0);
            format!("Settled {trade_id}: ${total:.2}")
        }
        "RISK_ALERT" => {
            let count = p.get("alerts").and_then(Value::as_array).map_or(0, Vec::len);
            format!("Alerts: {count}")
        }
        other => format!("{other}: {p:?}"),
    }
}

#[async_trait]
impl Organ for AuditTrail {
    fn listens_to(&self) -> &[String] {
        &self.listens_to
    }

    async fn handle(&self, event: &Event) -> Result<HandlerOutcome, HandlerError> {
        let record = AuditRecord {
            event_id: event.id().to_string(),
            event_type: event.event_type().to_string(),
            summary: summarize(event),
        };

        let mut state = self.state.lock().expect("audit trail lock poisoned");
        if state.log.len() >= self.max_log_size {
            state.log.pop_front();
        }
        state.log.push_back(record);

        match event.event_type() {
            "ORDER_VALIDATED" => state.stats.orders_validated += 1,
            "ORDER_REJECTED" => state.stats.orders_rejected += 1,
            "ORDER_FILLED" => state.stats.orders_filled += 1,
            "ORDER_PARTIAL_FILL" => state.stats.orders_partial += 1,
            "ORDER_QUEUED" => state.stats.orders_queued += 1,
            "TRADE_EXECUTED" => state.stats.trades_executed += 1,
            "SETTLEMENT_COMPLETE" => state.stats.settlements += 1,
            "RISK_ALERT" => state.stats.risk_alerts += 1,
            _ => {}
        }

        Ok(HandlerOutcome::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn event(event_type: &str, pairs: Vec<(&str, Value)>) -> Event {
        let payload: Map<String, Value> = pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        Event::new(event_type, payload).expect("should construct")
    }

    #[tokio::test]
    async fn records_every_matching_event_and_tallies_stats() {
        let audit = AuditTrail::default();
        let evt = event("ORDER_FILLED", vec![("quantity", json!(10)), ("symbol", json!("AAPL"))]);
        let outcome = audit.handle(&evt).await.expect("should succeed");
        assert_eq!(outcome, HandlerOutcome::None);

        let records = audit.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, "ORDER_FILLED");

        let stats = audit.stats();
        assert_eq!(stats.orders_filled, 1);
        assert_eq!(stats.orders_rejected, 0);
    }

    #[tokio::test]
    async fn evicts_oldest_once_the_log_is_full() {
        let audit = AuditTrail::new(2);
        for i in 0..3 {
            let evt = event("RISK_ALERT", vec![("i", json!(i))]);
            audit.handle(&evt).await.expect("should succeed");
        }
        let records = audit.records();
        assert_eq!(records.len(), 2);
        assert_eq!(audit.stats().risk_alerts, 3);
    }
}

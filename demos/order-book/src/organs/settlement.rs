//! `TRADE_EXECUTED` -> `SETTLEMENT_COMPLETE`, simulating clearing-house latency and both
//! permanent and transient settlement failures.

use super::payload;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde_json::Value;
use spine_core::event::Event;
use spine_core::organ::{HandlerError, HandlerOutcome, Organ};
use std::time::Duration;

/// Traders whose settlements always fail, exercising the dead-letter path deterministically.
const PROBLEMATIC_TRADERS: [&str; 2] = ["trader_bad_1", "trader_bad_2"];

/// Settles executed trades via a simulated clearing house: random 50-150ms latency, a
/// deterministic permanent failure for [`PROBLEMATIC_TRADERS`], and a roughly 5% transient
/// failure rate otherwise.
pub struct SettlementOrgan {
    listens_to: Vec<String>,
}

impl Default for SettlementOrgan {
    fn default() -> Self {
        Self {
            listens_to: vec!["TRADE_EXECUTED".to_string()],
        }
    }
}

#[async_trait]
impl Organ for SettlementOrgan {
    fn listens_to(&self) -> &[String] {
        &self.listens_to
    }

    async fn handle(&self, event: &Event) -> Result<HandlerOutcome, HandlerError> {
        let p = event.payload();
        let missing: Vec<&str> = ["trade_id", "buyer_id", "seller_id", "quantity", "price", "symbol"]
            .into_iter()
            .filter(|k| !p.contains_key(*k))
            .collect();
        if !missing.is_empty() {
            return Err(HandlerError::from(format!("missing required fields: {missing:?}")));
        }

        let trade_id = p.get("trade_id").and_then(Value::as_str).unwrap_or_default().to_string();
        let buyer_id = p.get("buyer_id").and_then(Value::as_str).unwrap_or_default().to_string();
        let seller_id = p.get("seller_id").and_then(Value::as_str).unwrap_or_default().to_string();
        let symbol = p.get("symbol").and_then(Value::as_str).unwrap_or_default().to_string();
        let quantity = p.get("quantity").and_then(Value::as_i64).unwrap_or_default();
        let price = p.get("price").and_then(Value::as_f64).unwrap_or_default();
        let total_value = quantity as f64 * price;

        let latency_ms = rand::thread_rng().gen_range(50..=150);
        tokio::time::sleep(Duration::from_millis(latency_ms)).await;

        if PROBLEMATIC_TRADERS.contains(&buyer_id.as_str()) {
            return Err(HandlerError::from(format!("settlement failed: {buyer_id} has insufficient funds")));
        }
        if PROBLEMATIC_TRADERS.contains(&seller_id.as_str()) {
            return Err(HandlerError::from(format!("settlement failed: {seller_id} has restricted account")));
        }

        if rand::thread_rng().gen_bool(0.05) {
            return Err(HandlerError::from(format!("clearing house timeout for trade {trade_id}")));
        }

        let settlement_fee = (total_value * 0.0001 * 100.0).round() / 100.0;

        let settled = Event::new(
            "SETTLEMENT_COMPLETE",
            payload(vec![
                ("trade_id", Value::String(trade_id)),
                ("symbol", Value::String(symbol)),
                ("buyer_id", Value::String(buyer_id)),
                ("seller_id", Value::String(seller_id)),
                ("quantity", Value::from(quantity)),
                ("price", Value::from(price)),
                ("total_value", Value::from(total_value)),
                ("settlement_fee", Value::from(settlement_fee)),
                ("settled_at", Value::String(Utc::now().to_rfc3339())),
            ]),
        )
        .map_err(|e| HandlerError::from(e.to_string()))?;

        Ok(HandlerOutcome::Single(settled))
    }
}

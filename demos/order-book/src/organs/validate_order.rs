//! `ORDER_SUBMITTED` -> `ORDER_VALIDATED` | `ORDER_REJECTED`.

use super::payload;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use spine_core::event::Event;
use spine_core::organ::{HandlerError, HandlerOutcome, Organ};

const VALID_SYMBOLS: [&str; 7] = ["AAPL", "GOOGL", "MSFT", "AMZN", "TSLA", "NVDA", "META"];
const VALID_SIDES: [&str; 2] = ["BUY", "SELL"];
const VALID_ORDER_TYPES: [&str; 2] = ["LIMIT", "MARKET"];
const MAX_QUANTITY: i64 = 10_000;
const MAX_PRICE: f64 = 100_000.0;

/// Validates an order before it reaches the matching engine: known symbol, `BUY`/`SELL` side,
/// `LIMIT`/`MARKET` order type, a positive quantity under [`MAX_QUANTITY`], and for `LIMIT`
/// orders, a positive price under [`MAX_PRICE`].
pub struct ValidateOrder {
    listens_to: Vec<String>,
}

impl Default for ValidateOrder {
    fn default() -> Self {
        Self {
            listens_to: vec!["ORDER_SUBMITTED".to_string()],
        }
    }
}

#[async_trait]
impl Organ for ValidateOrder {
    fn listens_to(&self) -> &[String] {
        &self.listens_to
    }

    async fn handle(&self, event: &Event) -> Result<HandlerOutcome, HandlerError> {
        let p = event.payload();
        let mut errors = Vec::new();

        let trader_id = p.get("trader_id").and_then(Value::as_str).unwrap_or("").trim().to_string();
        if trader_id.is_empty() {
            errors.push("trader_id required".to_string());
        }

        let symbol = p
            .get("symbol")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_uppercase();
        if !VALID_SYMBOLS.contains(&symbol.as_str()) {
            errors.push(format!("invalid symbol: {symbol}"));
        }

        let side = p.get("side").and_then(Value::as_str).unwrap_or("").to_uppercase();
        if !VALID_SIDES.contains(&side.as_str()) {
            errors.push(format!("invalid side: {side}"));
        }

        let order_type = match p.get("order_type").and_then(Value::as_str) {
            None => {
                errors.push("order_type required".to_string());
                String::new()
            }
            Some(raw) => {
                let order_type = raw.to_uppercase();
                if !VALID_ORDER_TYPES.contains(&order_type.as_str()) {
                    errors.push(format!("invalid order_type: {order_type}"));
                }
                order_type
            }
        };

        let quantity = p.get("quantity").and_then(Value::as_i64).unwrap_or(0);
        if quantity <= 0 {
            errors.push("quantity must be a positive integer".to_string());
        } else if quantity > MAX_QUANTITY {
            errors.push(format!("quantity exceeds max {MAX_QUANTITY}"));
        }

        let price = p.get("price").and_then(Value::as_f64).unwrap_or(0.0);
        if order_type == "LIMIT" {
            if price <= 0.0 {
                errors.push("LIMIT order requires positive price".to_string());
            } else if price > MAX_PRICE {
                errors.push(format!("price exceeds max {MAX_PRICE}"));
            }
        }

        let outcome_event = if errors.is_empty() {
            Event::new(
                "ORDER_VALIDATED",
                payload(vec![
                    ("order_id", Value::String(event.id().to_string())),
                    ("trader_id", Value::String(trader_id)),
                    ("symbol", Value::String(symbol)),
                    ("side", Value::String(side)),
                    ("order_type", Value::String(order_type.clone())),
                    ("quantity", Value::from(quantity)),
                    (
                        "price",
                        if order_type == "LIMIT" {
                            Value::from(price)
                        } else {
                            Value::Null
                        },
                    ),
                    ("validated_at", Value::String(Utc::now().to_rfc3339())),
                ]),
            )
        } else {
            let trader_id = if trader_id.is_empty() { "unknown".to_string() } else { trader_id };
            Event::new(
                "ORDER_REJECTED",
                payload(vec![
                    ("order_id", Value::String(event.id().to_string())),
                    ("trader_id", Value::String(trader_id)),
                    ("reason", Value::String(errors.join("; "))),
                    ("rejected_at", Value::String(Utc::now().to_rfc3339())),
                ]),
            )
        }
        .map_err(|e| HandlerError::from(e.to_string()))?;

        Ok(HandlerOutcome::Single(outcome_event))
    }
}

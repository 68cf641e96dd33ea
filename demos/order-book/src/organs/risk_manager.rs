//! `SETTLEMENT_COMPLETE` | `ORDER_FILLED` | `ORDER_PARTIAL_FILL` -> `RISK_ALERT` (only when a
//! limit is breached).

use super::payload;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::Value;
use spine_core::event::Event;
use spine_core::organ::{HandlerError, HandlerOutcome, Organ};
use std::collections::HashMap;
use std::sync::Mutex;

const MAX_POSITION_VALUE: f64 = 1_000_000.0;
const MAX_DAILY_VOLUME: i64 = 50_000;

struct State {
    positions: HashMap<String, HashMap<String, i64>>,
    daily_volume: HashMap<String, i64>,
    volume_reset_date: NaiveDate,
}

/// Tracks per-trader positions and daily traded volume, emitting `RISK_ALERT` when a position
/// value or daily volume threshold is breached. Daily volume resets on UTC date rollover.
pub struct RiskManager {
    listens_to: Vec<String>,
    state: Mutex<State>,
}

impl Default for RiskManager {
    fn default() -> Self {
        Self {
            listens_to: vec![
                "SETTLEMENT_COMPLETE".to_string(),
                "ORDER_FILLED".to_string(),
                "ORDER_PARTIAL_FILL".to_string(),
            ],
            state: Mutex::new(State {
                positions: HashMap::new(),
                daily_volume: HashMap::new(),
                volume_reset_date: Utc::now().date_naive(),
            }),
        }
    }
}

struct Alert {
    alert_type: &'static str,
    trader_id: String,
    symbol: Option<String>,
    value: f64,
    limit: f64,
}

fn alert_to_value(alert: &Alert) -> Value {
    let mut pairs = vec![
        ("type", Value::String(alert.alert_type.to_string())),
        ("trader_id", Value::String(alert.trader_id.clone())),
    ];
    if let Some(symbol) = &alert.symbol {
        pairs.push(("symbol", Value::String(symbol.clone())));
    }
    match alert.alert_type {
        "POSITION_LIMIT" => pairs.push(("position_value", Value::from(alert.value))),
        _ => pairs.push(("daily_volume", Value::from(alert.value as i64))),
    }
    pairs.push(("limit", Value::from(alert.limit)));
    Value::Object(payload(pairs))
}

#[async_trait]
impl Organ for RiskManager {
    fn listens_to(&self) -> &[String] {
        &self.listens_to
    }

    async fn handle(&self, event: &Event) -> Result<HandlerOutcome, HandlerError> {
        let p = event.payload();
        let mut state = self.state.lock().expect("risk manager lock poisoned");

        let today = Utc::now().date_naive();
        if today != state.volume_reset_date {
            state.daily_volume.clear();
            state.volume_reset_date = today;
        }

        let mut alerts = Vec::new();

        if event.event_type() == "SETTLEMENT_COMPLETE" {
            let buyer = p.get("buyer_id").and_then(Value::as_str);
            let seller = p.get("seller_id").and_then(Value::as_str);
            let symbol = p.get("symbol").and_then(Value::as_str);
            let qty = p.get("quantity").and_then(Value::as_i64);
            let price = p.get("price").and_then(Value::as_f64);

            let (Some(buyer), Some(seller), Some(symbol), Some(qty), Some(price)) =
                (buyer, seller, symbol, qty, price)
            else {
                tracing::warn!(event_id = %event.id(), "skipping SETTLEMENT_COMPLETE with missing or invalid fields");
                return Ok(HandlerOutcome::None);
            };
            if qty <= 0 || price <= 0.0 {
                tracing::warn!(event_id = %event.id(), "skipping SETTLEMENT_COMPLETE with invalid quantity or price");
                return Ok(HandlerOutcome::None);
            }

            *state
                .positions
                .entry(buyer.to_string())
                .or_default()
                .entry(symbol.to_string())
                .or_insert(0) += qty;
            *state
                .positions
                .entry(seller.to_string())
                .or_default()
                .entry(symbol.to_string())
                .or_insert(0) -= qty;
            *state.daily_volume.entry(buyer.to_string()).or_insert(0) += qty;
            *state.daily_volume.entry(seller.to_string()).or_insert(0) += qty;

            let buyer_position = state.positions[buyer][symbol];
            let buyer_value = (buyer_position as f64 * price).abs();
            if buyer_value > MAX_POSITION_VALUE {
                alerts.push(Alert {
                    alert_type: "POSITION_LIMIT",
                    trader_id: buyer.to_string(),
                    symbol: Some(symbol.to_string()),
                    value: buyer_value,
                    limit: MAX_POSITION_VALUE,
                });
            }

            let seller_position = state.positions[seller][symbol];
            let seller_value = (seller_position as f64 * price).abs();
            if seller_value > MAX_POSITION_VALUE {
                alerts.push(Alert {
                    alert_type: "POSITION_LIMIT",
                    trader_id: seller.to_string(),
                    symbol: Some(symbol.to_string()),
                    value: seller_value,
                    limit: MAX_POSITION_VALUE,
                });
            }

            let buyer_volume = state.daily_volume[buyer];
            if buyer_volume > MAX_DAILY_VOLUME {
                alerts.push(Alert {
                    alert_type: "VOLUME_LIMIT",
                    trader_id: buyer.to_string(),
                    symbol: None,
                    value: buyer_volume as f64,
                    limit: MAX_DAILY_VOLUME as f64,
                });
            }

            let seller_volume = state.daily_volume[seller];
            if seller_volume > MAX_DAILY_VOLUME {
                alerts.push(Alert {
                    alert_type: "VOLUME_LIMIT",
                    trader_id: seller.to_string(),
                    symbol: None,
                    value: seller_volume as f64,
                    limit: MAX_DAILY_VOLUME as f64,
                });
            }
        } else {
            let trader = p.get("trader_id").and_then(Value::as_str).unwrap_or_default().to_string();
            let qty = p
                .get("quantity")
                .and_then(Value::as_i64)
                .or_else(|| p.get("filled_quantity").and_then(Value::as_i64))
                .unwrap_or(0);
            let volume = {
                let entry = state.daily_volume.entry(trader.clone()).or_insert(0);
                *entry += qty;
                *entry
            };
            if volume > MAX_DAILY_VOLUME {
                alerts.push(Alert {
                    alert_type: "VOLUME_LIMIT",
                    trader_id: trader,
                    symbol: None,
                    value: volume as f64,
                    limit: MAX_DAILY_VOLUME as f64,
                });
            }
        }

        if alerts.is_empty() {
            return Ok(HandlerOutcome::None);
        }

        let triggered_by = event.event_type().to_string();
        let alerts_value = Value::Array(alerts.iter().map(alert_to_value).collect());
        let risk_alert = Event::new(
            "RISK_ALERT",
            payload(vec![
                ("alerts", alerts_value),
                ("triggered_by", Value::String(triggered_by)),
                ("triggered_at", Value::String(Utc::now().to_rfc3339())),
            ]),
        )
        .map_err(|e| HandlerError::from(e.to_string()))?;

        Ok(HandlerOutcome::Single(risk_alert))
    }
}

//! `ORDER_VALIDATED` -> `TRADE_EXECUTED` (zero or more) plus exactly one of
//! `ORDER_FILLED`/`ORDER_PARTIAL_FILL`/`ORDER_QUEUED`/`ORDER_REJECTED`.
//!
//! Maintains a live, per-symbol price-time-priority order book shared across every call via an
//! internal `Mutex`, mirroring a matching engine whose book state outlives any single order.

use super::payload;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use spine_core::event::Event;
use spine_core::organ::{HandlerError, HandlerOutcome, Organ};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct RestingOrder {
    order_id: String,
    trader_id: String,
    quantity: i64,
    price: f64,
    sequence: u64,
}

#[derive(Debug, Clone)]
struct Handle {
    order_id: String,
    price: f64,
    sequence: u64,
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.order_id == other.order_id
    }
}

impl Eq for Handle {}

/// A resting-bid handle: higher price pops first, earlier sequence breaks ties.
#[derive(Debug, Clone, PartialEq)]
struct BidHandle(Handle);

impl Eq for BidHandle {}

impl Ord for BidHandle {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .price
            .total_cmp(&other.0.price)
            .then_with(|| other.0.sequence.cmp(&self.0.sequence))
    }
}

impl PartialOrd for BidHandle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A resting-ask handle: lower price pops first, earlier sequence breaks ties.
#[derive(Debug, Clone, PartialEq)]
struct AskHandle(Handle);

impl Eq for AskHandle {}

impl Ord for AskHandle {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .price
            .total_cmp(&self.0.price)
            .then_with(|| other.0.sequence.cmp(&self.0.sequence))
    }
}

impl PartialOrd for AskHandle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct OrderBook {
    bids: BinaryHeap<BidHandle>,
    asks: BinaryHeap<AskHandle>,
    orders: HashMap<String, RestingOrder>,
}

impl OrderBook {
    fn add_order(&mut self, order: RestingOrder, side: &str) {
        let handle = Handle {
            order_id: order.order_id.clone(),
            price: order.price,
            sequence: order.sequence,
        };
        if side == "BUY" {
            self.bids.push(BidHandle(handle));
        } else {
            self.asks.push(AskHandle(handle));
        }
        self.orders.insert(order.order_id.clone(), order);
    }

    fn best_bid(&mut self) -> Option<RestingOrder> {
        loop {
            let top = self.bids.peek()?;
            if self.orders.contains_key(&top.0.order_id) {
                return self.orders.get(&top.0.order_id).cloned();
            }
            self.bids.pop();
        }
    }

    fn best_ask(&mut self) -> Option<RestingOrder> {
        loop {
            let top = self.asks.peek()?;
            if self.orders.contains_key(&top.0.order_id) {
                return self.orders.get(&top.0.order_id).cloned();
            }
            self.asks.pop();
        }
    }

    fn update_quantity(&mut self, order_id: &str, quantity: i64) {
        if quantity <= 0 {
            self.orders.remove(order_id);
        } else if let Some(order) = self.orders.get_mut(order_id) {
            order.quantity = quantity;
        }
    }
}

struct Fill {
    trade_id: String,
    quantity: i64,
    price: f64,
    counterparty_id: String,
    counterparty_order: String,
}

/// Matches validated orders against a live, price-time-priority book per symbol.
pub struct MatchingEngine {
    listens_to: Vec<String>,
    books: Mutex<HashMap<String, OrderBook>>,
    sequence: AtomicU64,
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self {
            listens_to: vec!["ORDER_VALIDATED".to_string()],
            books: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(0),
        }
    }
}

fn reject(order_id: &str, trader_id: &str, reason: &str) -> Result<Event, HandlerError> {
    Event::new(
        "ORDER_REJECTED",
        payload(vec![
            ("order_id", Value::String(order_id.to_string())),
            ("trader_id", Value::String(trader_id.to_string())),
            ("reason", Value::String(reason.to_string())),
            ("rejected_at", Value::String(Utc::now().to_rfc3339())),
        ]),
    )
    .map_err(|e| HandlerError::from(e.to_string()))
}

fn fill_to_value(fill: &Fill) -> Value {
    Value::Object(payload(vec![
        ("trade_id", Value::String(fill.trade_id.clone())),
        ("quantity", Value::from(fill.quantity)),
        ("price", Value::from(fill.price)),
        ("counterparty_id", Value::String(fill.counterparty_id.clone())),
        ("counterparty_order", Value::String(fill.counterparty_order.clone())),
    ]))
}

#[async_trait]
impl Organ for MatchingEngine {
    fn listens_to(&self) -> &[String] {
        &self.listens_to
    }

    #[allow(clippy::too_many_lines)]
    async fn handle(&self, event: &Event) -> Result<HandlerOutcome, HandlerError> {
        let p = event.payload();
        let order_id = p.get("order_id").and_then(Value::as_str).unwrap_or_default().to_string();
        let symbol = p.get("symbol").and_then(Value::as_str).unwrap_or_default().to_string();
        let side = p.get("side").and_then(Value::as_str).unwrap_or_default().to_string();
        let order_type = p.get("order_type").and_then(Value::as_str).unwrap_or_default().to_string();
        let quantity = p.get("quantity").and_then(Value::as_i64).unwrap_or(0);
        let price = p.get("price").and_then(Value::as_f64).unwrap_or(0.0);
        let trader_id = p.get("trader_id").and_then(Value::as_str).unwrap_or_default().to_string();

        if quantity <= 0 {
            return Ok(HandlerOutcome::Single(reject(&order_id, &trader_id, "Invalid quantity")?));
        }
        if order_type == "LIMIT" && price <= 0.0 {
            return Ok(HandlerOutcome::Single(reject(&order_id, &trader_id, "Invalid price")?));
        }
        if order_type != "LIMIT" && order_type != "MARKET" {
            return Ok(HandlerOutcome::Single(reject(&order_id, &trader_id, "Invalid order type")?));
        }
        if side != "BUY" && side != "SELL" {
            return Ok(HandlerOutcome::Single(reject(&order_id, &trader_id, "Invalid side")?));
        }

        let mut events = Vec::new();
        let mut fills = Vec::new();
        let mut remaining_qty = quantity;

        {
            let mut books = self.books.lock().expect("order book lock poisoned");
            let book = books.entry(symbol.clone()).or_default();

            while remaining_qty > 0 {
                let best = if side == "BUY" { book.best_ask() } else { book.best_bid() };
                let Some(best) = best else { break };

                if order_type == "LIMIT" {
                    let crosses = if side == "BUY" { best.price <= price } else { best.price >= price };
                    if !crosses {
                        break;
                    }
                }

                let fill_qty = remaining_qty.min(best.quantity);
                let fill_price = best.price;
                let trade_id = format!("T{}", uuid::Uuid::new_v4());

                fills.push(Fill {
                    trade_id: trade_id.clone(),
                    quantity: fill_qty,
                    price: fill_price,
                    counterparty_id: best.trader_id.clone(),
                    counterparty_order: best.order_id.clone(),
                });

                let (buyer_id, buyer_order, seller_id, seller_order) = if side == "BUY" {
                    (trader_id.clone(), order_id.clone(), best.trader_id.clone(), best.order_id.clone())
                } else {
                    (best.trader_id.clone(), best.order_id.clone(), trader_id.clone(), order_id.clone())
                };

                events.push(
                    Event::new(
                        "TRADE_EXECUTED",
                        payload(vec![
                            ("trade_id", Value::String(trade_id)),
                            ("symbol", Value::String(symbol.clone())),
                            ("price", Value::from(fill_price)),
                            ("quantity", Value::from(fill_qty)),
                            ("buyer_id", Value::String(buyer_id)),
                            ("buyer_order", Value::String(buyer_order)),
                            ("seller_id", Value::String(seller_id)),
                            ("seller_order", Value::String(seller_order)),
                            ("executed_at", Value::String(Utc::now().to_rfc3339())),
                        ]),
                    )
                    .map_err(|e| HandlerError::from(e.to_string()))?,
                );

                remaining_qty -= fill_qty;
                book.update_quantity(&best.order_id, best.quantity - fill_qty);
            }

            let filled_qty = quantity - remaining_qty;

            if filled_qty == quantity {
                let total_value: f64 = fills.iter().map(|f| f.price * f.quantity as f64).sum();
                let fills_value = Value::Array(fills.iter().map(fill_to_value).collect());
                events.push(
                    Event::new(
                        "ORDER_FILLED",
                        payload(vec![
                            ("order_id", Value::String(order_id.clone())),
                            ("trader_id", Value::String(trader_id.clone())),
                            ("symbol", Value::String(symbol.clone())),
                            ("side", Value::String(side.clone())),
                            ("quantity", Value::from(quantity)),
                            ("fills", fills_value),
                            ("avg_price", Value::from(total_value / quantity as f64)),
                            ("filled_at", Value::String(Utc::now().to_rfc3339())),
                        ]),
                    )
                    .map_err(|e| HandlerError::from(e.to_string()))?,
                );
            } else if filled_qty > 0 {
                let fills_value = Value::Array(fills.iter().map(fill_to_value).collect());
                events.push(
                    Event::new(
                        "ORDER_PARTIAL_FILL",
                        payload(vec![
                            ("order_id", Value::String(order_id.clone())),
                            ("trader_id", Value::String(trader_id.clone())),
                            ("symbol", Value::String(symbol.clone())),
                            ("side", Value::String(side.clone())),
                            ("original_quantity", Value::from(quantity)),
                            ("filled_quantity", Value::from(filled_qty)),
                            ("remaining_quantity", Value::from(remaining_qty)),
                            ("fills", fills_value),
                            ("filled_at", Value::String(Utc::now().to_rfc3339())),
                        ]),
                    )
                    .map_err(|e| HandlerError::from(e.to_string()))?,
                );
                if order_type == "LIMIT" {
                    let sequence = self.sequence.fetch_add(1, AtomicOrdering::SeqCst);
                    book.add_order(
                        RestingOrder {
                            order_id: order_id.clone(),
                            trader_id: trader_id.clone(),
                            quantity: remaining_qty,
                            price,
                            sequence,
                        },
                        &side,
                    );
                }
            } else if order_type == "LIMIT" {
                let sequence = self.sequence.fetch_add(1, AtomicOrdering::SeqCst);
                book.add_order(
                    RestingOrder {
                        order_id: order_id.clone(),
                        trader_id: trader_id.clone(),
                        quantity,
                        price,
                        sequence,
                    },
                    &side,
                );
                events.push(
                    Event::new(
                        "ORDER_QUEUED",
                        payload(vec![
                            ("order_id", Value::String(order_id.clone())),
                            ("trader_id", Value::String(trader_id.clone())),
                            ("symbol", Value::String(symbol.clone())),
                            ("side", Value::String(side.clone())),
                            ("quantity", Value::from(quantity)),
                            ("price", Value::from(price)),
                            ("queued_at", Value::String(Utc::now().to_rfc3339())),
                        ]),
                    )
                    .map_err(|e| HandlerError::from(e.to_string()))?,
                );
            } else {
                events.push(reject(&order_id, &trader_id, "No liquidity for MARKET order")?);
            }
        }

        Ok(HandlerOutcome::Many(events))
    }
}

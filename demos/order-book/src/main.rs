//! Order book demo: matches a seeded batch of orders against a live price-time-priority book,
//! settles resulting trades, tracks per-trader risk limits, and records a full compliance audit
//! trail.
//!
//! Run with `cargo run -p order-book`.

mod organs;

use anyhow::Result;
use organs::{AuditTrail, MatchingEngine, RiskManager, SettlementOrgan, ValidateOrder};
use serde_json::{json, Map, Value};
use spine_core::event::Event;
use spine_core::organ::Organ;
use spine_runtime::config::SpineConfig;
use spine_runtime::policy::{EnqueueFailureMode, HandlerFailureMode};
use spine_runtime::spine::Spine;
use spine_testing::AutoStopBackend;
use std::sync::Arc;
use std::time::Duration;

fn payload(pairs: Vec<(&str, Value)>) -> Map<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn order(trader_id: &str, symbol: &str, side: &str, order_type: &str, quantity: i64, price: f64) -> Result<Event> {
    Event::new(
        "ORDER_SUBMITTED",
        payload(vec![
            ("trader_id", json!(trader_id)),
            ("symbol", json!(symbol)),
            ("side", json!(side)),
            ("order_type", json!(order_type)),
            ("quantity", json!(quantity)),
            ("price", json!(price)),
        ]),
    )
    .map_err(anyhow::Error::from)
}

/// A realistic sequence of orders: market-maker liquidity, aggressive crossing orders, a partial
/// fill, rejected orders, a settlement failure, and a large pair sized to trip the risk limit.
fn sample_orders() -> Result<Vec<Event>> {
    Ok(vec![
        order("mm_1", "AAPL", "BUY", "LIMIT", 100, 149.50)?,
        order("mm_1", "AAPL", "BUY", "LIMIT", 200, 149.00)?,
        order("mm_1", "AAPL", "SELL", "LIMIT", 100, 150.50)?,
        order("mm_1", "AAPL", "SELL", "LIMIT", 200, 151.00)?,
        order("trader_1", "AAPL", "BUY", "MARKET", 50, 0.0)?,
        order("trader_2", "AAPL", "SELL", "MARKET", 75, 0.0)?,
        order("trader_3", "AAPL", "BUY", "LIMIT", 300, 150.75)?,
        order("trader_4", "AAPL", "SELL", "LIMIT", 150, 149.25)?,
        order("", "AAPL", "BUY", "LIMIT", 100, 150.00)?,
        order("trader_5", "INVALID", "BUY", "LIMIT", 100, 100.00)?,
        order("trader_6", "AAPL", "BUY", "LIMIT", -50, 150.00)?,
        order("trader_bad_1", "AAPL", "BUY", "MARKET", 25, 0.0)?,
        order("trader_7", "GOOGL", "BUY", "LIMIT", 50, 140.00)?,
        order("trader_8", "GOOGL", "SELL", "LIMIT", 50, 140.00)?,
        order("whale_1", "TSLA", "BUY", "LIMIT", 5000, 250.00)?,
        order("whale_2", "TSLA", "SELL", "LIMIT", 5000, 250.00)?,
    ])
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let audit = Arc::new(AuditTrail::default());
    let organs: Vec<Arc<dyn Organ>> = vec![
        Arc::new(ValidateOrder::default()),
        Arc::new(MatchingEngine::default()),
        Arc::new(SettlementOrgan::default()),
        Arc::new(RiskManager::default()),
        audit.clone(),
    ];

    let backend = Arc::new(AutoStopBackend::new(Duration::from_millis(300)));
    let config = SpineConfig::builder()
        .max_steps(50_000)
        .enqueue_failure_mode(EnqueueFailureMode::Store)
        .handler_failure_mode(HandlerFailureMode::Store)
        .retry_attempts(2)
        .retry_base_delay(Duration::from_millis(10))
        .handler_timeout(Duration::from_secs(5))
        .build();

    let spine = Arc::new(Spine::new(organs, backend.clone(), config)?);
    backend.bind(&spine);

    for event in sample_orders()? {
        backend.enqueue(event).await?;
    }

    let stats = spine.run(None).await?;

    println!("=== order book run complete ===");
    println!("events processed: {}", stats.events_processed);
    println!("events emitted:   {}", stats.events_emitted);
    if !stats.handler_errors.is_empty() {
        println!("handler errors:");
        for (organ, count) in &stats.handler_errors {
            println!("  {organ}: {count}");
        }
    }

    let failed = spine.failed_event_store();
    let entries = failed.entries();
    println!("\n=== dead letters ({}) ===", entries.len());
    for entry in entries.iter().take(5) {
        println!("  [{}] {}", entry.event.event_type(), entry.reason);
    }
    if entries.len() > 5 {
        println!("  ... and {} more", entries.len() - 5);
    }

    let audit_stats = audit.stats();
    println!("\n=== audit trail summary ===");
    println!("  orders validated: {}", audit_stats.orders_validated);
    println!("  orders rejected:  {}", audit_stats.orders_rejected);
    println!("  orders filled:    {}", audit_stats.orders_filled);
    println!("  orders partial:   {}", audit_stats.orders_partial);
    println!("  orders queued:    {}", audit_stats.orders_queued);
    println!("  trades executed:  {}", audit_stats.trades_executed);
    println!("  settlements:      {}", audit_stats.settlements);
    println!("  risk alerts:      {}", audit_stats.risk_alerts);

    Ok(())
}

use anyhow::Result;
use chrono::{Duration, Utc};
use common::{
    InMemorySignalStore, InMemoryViewRecordStore, LeverageHint, MarketCategory, PriceEvent,
    Signal, SignalDirection, SignalFilters, Tier,
};
use distribution::DistributionBroadcaster;
use entitlements::QuotaTracker;
use lifecycle::LifecycleEngine;
use rust_decimal::Decimal;
use signal_api::{EngineConfig, SignalQueryService};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{info, Level};
use tracing_subscriber::fmt;
use uuid::Uuid;

const RECV_WAIT: std::time::Duration = std::time::Duration::from_millis(200);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    fmt().with_max_level(Level::INFO).init();

    let config = EngineConfig::default();

    // In-memory collaborators; deployments swap in the Postgres stores.
    let signal_store = Arc::new(InMemorySignalStore::new());
    let view_store = Arc::new(InMemoryViewRecordStore::new());
    let quota = QuotaTracker::new(view_store);

    let (events_tx, events_rx) = mpsc::channel(config.distribution.event_buffer);
    let engine = Arc::new(LifecycleEngine::new(
        signal_store.clone(),
        events_tx,
        config.lifecycle.lifecycle_config(),
    ));
    let broadcaster = Arc::new(DistributionBroadcaster::new(
        quota.clone(),
        config.distribution.broadcaster_config(),
    ));
    tokio::spawn(broadcaster.clone().run(events_rx));
    tokio::spawn(engine.clone().run_expiry_sweeper(config.lifecycle.sweep_interval()));

    info!("Signal Distribution Engine Example");
    info!("===================================");

    // Two connected viewers at opposite ends of the entitlement ladder.
    let premium_viewer = Uuid::new_v4();
    let free_viewer = Uuid::new_v4();
    let mut premium_sub = broadcaster.subscribe(premium_viewer, Tier::Premium);
    let mut free_sub = broadcaster.subscribe(free_viewer, Tier::Free);

    // The producer publishes a fresh signal.
    let mut signal = Signal::new(
        MarketCategory::Crypto,
        "BTCUSDT",
        "Bitcoin",
        SignalDirection::Long,
        Decimal::from(100),
        Utc::now(),
    );
    signal.stop_loss = Some(Decimal::from(95));
    signal.take_profits = vec![
        Decimal::from(105),
        Decimal::from(110),
        Decimal::from(115),
    ];
    signal.leverage = Some(LeverageHint {
        conservative: 3,
        aggressive: 10,
    });
    signal.confidence = 4;
    signal.timeframe = "4h".to_string();
    signal.rationale = "Breakout above weekly resistance with rising volume".to_string();
    engine.publish_signal(signal).await?;

    // Premium sees the creation in real time; free is inside its one-hour
    // delay window and receives nothing yet.
    if let Ok(Some(delivery)) = timeout(RECV_WAIT, premium_sub.rx.recv()).await {
        info!(
            "Premium delivery: {:?} {} entry={:?}",
            delivery.kind, delivery.signal.symbol, delivery.signal.entry_price
        );
    }
    if timeout(RECV_WAIT, free_sub.rx.recv()).await.is_err() {
        info!("Free viewer received nothing (delay window)");
    }

    // The market prints through the third target.
    engine
        .on_price_event(&PriceEvent::new("BTCUSDT", Decimal::from(116), Utc::now()))
        .await?;

    if let Ok(Some(delivery)) = timeout(RECV_WAIT, premium_sub.rx.recv()).await {
        info!(
            "Premium delivery: {:?} pnl={:?}",
            delivery.kind, delivery.signal.result_pnl_percent
        );
    }
    // Completed signals are visible to every tier.
    if let Ok(Some(delivery)) = timeout(RECV_WAIT, free_sub.rx.recv()).await {
        info!(
            "Free delivery: {:?} pnl={:?}",
            delivery.kind, delivery.signal.result_pnl_percent
        );
    }

    // Read path: the free viewer re-fetches and sees the completed signal
    // with its outcome intact.
    let query = SignalQueryService::new(signal_store.clone(), quota.clone());
    let ctx = query.viewer_context(free_viewer, "free", Utc::now()).await;
    let listed = query.list_signals(&ctx, &SignalFilters::default()).await?;
    info!("Free viewer sees {} signals", listed.len());
    for view in &listed {
        info!(
            "  {} {} pnl={:?}",
            view.symbol, view.status, view.result_pnl_percent
        );
    }

    // Historical export requires an export-entitled tier.
    let premium_ctx = query.viewer_context(premium_viewer, "premium", Utc::now()).await;
    let history = query
        .export_history(&premium_ctx, Utc::now() - Duration::days(7), Utc::now())
        .await?;
    info!("Premium export covers {} signals", history.len());

    info!("=== Example Complete ===");
    Ok(())
}

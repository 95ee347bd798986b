// Lifecycle engine
// Serializes status transitions per signal, applies expiry, and emits one
// event per creation and transition to the distribution layer.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use common::{PriceEvent, Signal, SignalEvent, SignalFilters, SignalStatus, SignalStore};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::triggers::{self, Trigger};

/// Lifecycle configuration.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Maximum lifetime of an active signal before it expires, in hours.
    pub max_signal_lifetime_hours: i64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_signal_lifetime_hours: 48,
        }
    }
}

/// Drives the signal status state machine from market price events.
///
/// Transitions are serialized per signal id: concurrent evaluations of the
/// same signal race for the per-id lock and the loser observes a terminal
/// status and discards its attempt. A signal already closed ignores further
/// events, which also makes duplicate feed delivery harmless.
pub struct LifecycleEngine {
    store: Arc<dyn SignalStore>,
    events_tx: mpsc::Sender<SignalEvent>,
    config: LifecycleConfig,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
    // Last observed price per symbol, used to settle expiring signals.
    last_prices: DashMap<String, (Decimal, DateTime<Utc>)>,
}

impl LifecycleEngine {
    pub fn new(
        store: Arc<dyn SignalStore>,
        events_tx: mpsc::Sender<SignalEvent>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            store,
            events_tx,
            config,
            locks: DashMap::new(),
            last_prices: DashMap::new(),
        }
    }

    /// Persist a newly produced signal and announce it. Entry point for the
    /// external producer; signals arrive in `Active` status.
    pub async fn publish_signal(&self, signal: Signal) -> Result<()> {
        signal.validate()?;
        self.store.insert(&signal).await?;
        info!(signal_id = %signal.id, symbol = %signal.symbol, "Signal published");
        self.emit(SignalEvent::Created { signal }).await;
        Ok(())
    }

    /// Feed one price update through every active signal on its symbol.
    pub async fn on_price_event(&self, event: &PriceEvent) -> Result<()> {
        self.on_price_events(std::slice::from_ref(event)).await
    }

    /// Feed one evaluation window of price updates. Duplicates and
    /// out-of-order timestamps are tolerated; resolution follows
    /// [`triggers::resolve_batch`].
    pub async fn on_price_events(&self, events: &[PriceEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        self.note_prices(events);

        let symbols: HashSet<&str> = events.iter().map(|e| e.symbol.as_str()).collect();
        for symbol in symbols {
            let active = self
                .store
                .list(&SignalFilters::active_for_symbol(symbol))
                .await?;
            for signal in active {
                if let Some(trigger) = triggers::resolve_batch(&signal, events) {
                    self.apply_transition(signal.id, trigger).await?;
                }
            }
        }
        Ok(())
    }

    /// Expire active signals whose configured lifetime has elapsed without
    /// any threshold being crossed. Returns the number transitioned.
    pub async fn expire_due(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - Duration::hours(self.config.max_signal_lifetime_hours);
        let active = self.store.list(&SignalFilters::active()).await?;

        let mut expired = 0;
        for signal in active {
            if signal.created_at > cutoff {
                continue;
            }
            let exit = self.last_prices.get(&signal.symbol).map(|entry| entry.0);
            if self.expire_signal(signal.id, exit, now).await? {
                expired += 1;
            }
        }
        if expired > 0 {
            info!("Expired {} stale signals", expired);
        }
        Ok(expired)
    }

    /// Periodic expiry sweep; runs until the task is aborted.
    pub async fn run_expiry_sweeper(self: Arc<Self>, interval: std::time::Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.expire_due(Utc::now()).await {
                warn!("Expiry sweep failed: {}", e);
            }
        }
    }

    fn note_prices(&self, events: &[PriceEvent]) {
        for event in events {
            let mut entry = self
                .last_prices
                .entry(event.symbol.clone())
                .or_insert((event.price, event.timestamp));
            if event.timestamp >= entry.1 {
                *entry = (event.price, event.timestamp);
            }
        }
    }

    async fn apply_transition(&self, signal_id: Uuid, trigger: Trigger) -> Result<bool> {
        let lock = self.signal_lock(signal_id);
        let _guard = lock.lock().await;

        // Re-read under the lock; the loser of a concurrent race observes a
        // terminal status here and discards its attempt.
        let Some(mut signal) = self.store.get(signal_id).await? else {
            warn!(signal_id = %signal_id, "Transition target missing from store");
            return Ok(false);
        };
        if signal.status.is_terminal() {
            debug!(signal_id = %signal_id, "Transition race lost, signal already closed");
            return Ok(false);
        }

        let previous = signal.status;
        let pnl = triggers::pnl_percent(signal.direction, signal.entry_price, trigger.price);
        signal.status = trigger.breach.status();
        signal.closed_at = Some(trigger.at);
        signal.result_pnl_percent = Some(pnl);
        self.store.update(&signal).await?;

        info!(
            signal_id = %signal.id,
            status = %signal.status,
            pnl = %pnl,
            "Signal transitioned"
        );
        self.emit(SignalEvent::Transitioned { signal, previous }).await;
        Ok(true)
    }

    async fn expire_signal(
        &self,
        signal_id: Uuid,
        exit: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let lock = self.signal_lock(signal_id);
        let _guard = lock.lock().await;

        let Some(mut signal) = self.store.get(signal_id).await? else {
            return Ok(false);
        };
        if signal.status.is_terminal() {
            return Ok(false);
        }

        let previous = signal.status;
        let pnl = exit
            .map(|price| triggers::pnl_percent(signal.direction, signal.entry_price, price))
            .unwrap_or(Decimal::ZERO);
        signal.status = SignalStatus::Expired;
        signal.closed_at = Some(now);
        signal.result_pnl_percent = Some(pnl);
        self.store.update(&signal).await?;

        info!(
            signal_id = %signal.id,
            pnl = %pnl,
            "Signal expired without hitting a threshold"
        );
        self.emit(SignalEvent::Transitioned { signal, previous }).await;
        Ok(true)
    }

    fn signal_lock(&self, signal_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(signal_id)
            .or_insert_with(Default::default)
            .clone()
    }

    async fn emit(&self, event: SignalEvent) {
        // At-most-once toward the broadcaster; a dropped receiver means the
        // distribution side is shutting down, not an engine failure.
        if self.events_tx.send(event).await.is_err() {
            warn!("Lifecycle event dropped, distribution channel closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{InMemorySignalStore, MarketCategory, SignalDirection};

    fn test_signal() -> Signal {
        let mut signal = Signal::new(
            MarketCategory::Crypto,
            "BTCUSDT",
            "Bitcoin",
            SignalDirection::Long,
            Decimal::from(100),
            Utc::now() - Duration::hours(1),
        );
        signal.stop_loss = Some(Decimal::from(95));
        signal.take_profits = vec![
            Decimal::from(105),
            Decimal::from(110),
            Decimal::from(115),
        ];
        signal
    }

    fn engine_with_store() -> (Arc<LifecycleEngine>, Arc<InMemorySignalStore>, mpsc::Receiver<SignalEvent>) {
        let store = Arc::new(InMemorySignalStore::new());
        let (tx, rx) = mpsc::channel(32);
        let engine = Arc::new(LifecycleEngine::new(
            store.clone(),
            tx,
            LifecycleConfig::default(),
        ));
        (engine, store, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<SignalEvent>) -> Vec<SignalEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_publish_emits_created_event() {
        let (engine, store, mut rx) = engine_with_store();
        let signal = test_signal();
        let signal_id = signal.id;

        engine.publish_signal(signal).await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], SignalEvent::Created { signal } if signal.id == signal_id));
        assert!(store.get(signal_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_tp3_print_closes_with_sixteen_percent() {
        let (engine, store, mut rx) = engine_with_store();
        let signal = test_signal();
        let signal_id = signal.id;
        engine.publish_signal(signal).await.unwrap();
        drain(&mut rx);

        let t1 = Utc::now();
        engine
            .on_price_event(&PriceEvent::new("BTCUSDT", Decimal::from(116), t1))
            .await
            .unwrap();

        let closed = store.get(signal_id).await.unwrap().unwrap();
        assert_eq!(closed.status, SignalStatus::HitTp3);
        assert_eq!(closed.closed_at, Some(t1));
        assert_eq!(closed.result_pnl_percent, Some(Decimal::new(1600, 2)));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            SignalEvent::Transitioned { previous, .. } if *previous == SignalStatus::Active
        ));
    }

    #[tokio::test]
    async fn test_terminal_signal_ignores_further_events() {
        let (engine, store, mut rx) = engine_with_store();
        let signal = test_signal();
        let signal_id = signal.id;
        engine.publish_signal(signal).await.unwrap();

        let t1 = Utc::now();
        engine
            .on_price_event(&PriceEvent::new("BTCUSDT", Decimal::from(116), t1))
            .await
            .unwrap();
        let closed = store.get(signal_id).await.unwrap().unwrap();
        drain(&mut rx);

        // Duplicate delivery and a later stop-level print both bounce off.
        engine
            .on_price_event(&PriceEvent::new("BTCUSDT", Decimal::from(116), t1))
            .await
            .unwrap();
        engine
            .on_price_event(&PriceEvent::new("BTCUSDT", Decimal::from(90), Utc::now()))
            .await
            .unwrap();

        let after = store.get(signal_id).await.unwrap().unwrap();
        assert_eq!(after.status, closed.status);
        assert_eq!(after.closed_at, closed.closed_at);
        assert_eq!(after.result_pnl_percent, closed.result_pnl_percent);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_events_produce_one_transition() {
        let (engine, store, mut rx) = engine_with_store();
        let signal = test_signal();
        let signal_id = signal.id;
        engine.publish_signal(signal).await.unwrap();
        drain(&mut rx);

        let event = PriceEvent::new("BTCUSDT", Decimal::from(116), Utc::now());
        let a = {
            let engine = engine.clone();
            let event = event.clone();
            tokio::spawn(async move { engine.on_price_event(&event).await })
        };
        let b = {
            let engine = engine.clone();
            let event = event.clone();
            tokio::spawn(async move { engine.on_price_event(&event).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let closed = store.get(signal_id).await.unwrap().unwrap();
        assert_eq!(closed.status, SignalStatus::HitTp3);

        let transitions = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, SignalEvent::Transitioned { .. }))
            .count();
        assert_eq!(transitions, 1, "exactly one transition event per signal");
    }

    #[tokio::test]
    async fn test_expiry_settles_against_last_price() {
        let (engine, store, mut rx) = engine_with_store();
        let mut signal = test_signal();
        signal.created_at = Utc::now() - Duration::hours(72);
        let signal_id = signal.id;
        engine.publish_signal(signal).await.unwrap();
        drain(&mut rx);

        // A print that crosses nothing still updates the settlement price.
        engine
            .on_price_event(&PriceEvent::new("BTCUSDT", Decimal::from(101), Utc::now()))
            .await
            .unwrap();

        let expired = engine.expire_due(Utc::now()).await.unwrap();
        assert_eq!(expired, 1);

        let closed = store.get(signal_id).await.unwrap().unwrap();
        assert_eq!(closed.status, SignalStatus::Expired);
        assert_eq!(closed.result_pnl_percent, Some(Decimal::new(100, 2)));
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_expiry_without_prices_settles_flat() {
        let (engine, store, mut rx) = engine_with_store();
        let mut signal = test_signal();
        signal.created_at = Utc::now() - Duration::hours(72);
        let signal_id = signal.id;
        engine.publish_signal(signal).await.unwrap();
        drain(&mut rx);

        engine.expire_due(Utc::now()).await.unwrap();

        let closed = store.get(signal_id).await.unwrap().unwrap();
        assert_eq!(closed.status, SignalStatus::Expired);
        assert_eq!(closed.result_pnl_percent, Some(Decimal::ZERO));
    }

    #[tokio::test]
    async fn test_young_signals_survive_expiry_sweep() {
        let (engine, store, mut rx) = engine_with_store();
        let signal = test_signal();
        let signal_id = signal.id;
        engine.publish_signal(signal).await.unwrap();
        drain(&mut rx);

        let expired = engine.expire_due(Utc::now()).await.unwrap();
        assert_eq!(expired, 0);
        assert!(store.get(signal_id).await.unwrap().unwrap().is_active());
    }
}

// Signal query surface
// Read path for presentation collaborators: tier-aware listing with quota
// accounting, and the entitlement-gated historical export.

use anyhow::Result;
use chrono::{DateTime, Utc};
use common::{
    EngineError, Signal, SignalFilters, SignalStore, SignalView, Tier, ViewerContext,
};
use entitlements::{entitlement_of, evaluate, QuotaTracker};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Tier-aware read access to the signal store.
pub struct SignalQueryService {
    store: Arc<dyn SignalStore>,
    quota: QuotaTracker,
}

impl SignalQueryService {
    pub fn new(store: Arc<dyn SignalStore>, quota: QuotaTracker) -> Self {
        Self { store, quota }
    }

    /// Build the per-request viewer context from a verified identity and a
    /// raw tier name. Unknown names resolve to `free`.
    pub async fn viewer_context(
        &self,
        viewer_id: Uuid,
        tier_name: &str,
        now: DateTime<Utc>,
    ) -> ViewerContext {
        let tier = Tier::resolve(tier_name);
        let views_today = self.quota.count_today(viewer_id, now).await;
        ViewerContext::new(viewer_id, tier, views_today, now)
    }

    /// List signals the viewer may see, redacted per tier, newest first.
    ///
    /// Surfacing a previously unseen active signal consumes one unit of
    /// today's quota; delay-hidden signals are absent from the result and
    /// consume nothing. A store failure propagates as a retryable
    /// [`EngineError::UpstreamUnavailable`].
    pub async fn list_signals(
        &self,
        ctx: &ViewerContext,
        filters: &SignalFilters,
    ) -> Result<Vec<SignalView>> {
        let signals = self
            .store
            .list(filters)
            .await
            .map_err(|e| EngineError::upstream(format!("signal store list failed: {e}")))?;

        let mut count = self.quota.count_today(ctx.viewer_id, ctx.now).await;
        let mut views = Vec::with_capacity(signals.len());
        for signal in &signals {
            let exhausted = QuotaTracker::is_exhausted(count, ctx.tier);
            let decision = evaluate(signal, ctx.tier, exhausted, ctx.now);
            let Some(view) = decision.view else {
                debug!(signal_id = %signal.id, viewer_id = %ctx.viewer_id, "Signal hidden from viewer");
                continue;
            };
            if signal.is_active() {
                count = self.quota.record_view(ctx.viewer_id, signal.id, ctx.now).await;
            }
            views.push(view);
        }
        Ok(views)
    }

    /// Bulk historical export over a creation-date range, newest first.
    ///
    /// All-or-nothing: gated by the tier's export right and deliberately
    /// unredacted once granted.
    pub async fn export_history(
        &self,
        ctx: &ViewerContext,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Signal>> {
        if !entitlement_of(ctx.tier).can_export_history {
            return Err(EngineError::ExportNotPermitted { tier: ctx.tier }.into());
        }
        let signals = self
            .store
            .list_range(start, end)
            .await
            .map_err(|e| EngineError::upstream(format!("signal store range read failed: {e}")))?;
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use common::{
        InMemorySignalStore, InMemoryViewRecordStore, MarketCategory, SignalDirection,
        ViewRecordStore,
    };
    use rust_decimal::Decimal;

    fn service() -> (SignalQueryService, Arc<InMemorySignalStore>) {
        let store = Arc::new(InMemorySignalStore::new());
        let quota = QuotaTracker::new(Arc::new(InMemoryViewRecordStore::new()));
        (SignalQueryService::new(store.clone(), quota), store)
    }

    fn active_signal(symbol: &str, created_at: DateTime<Utc>) -> Signal {
        let mut signal = Signal::new(
            MarketCategory::Crypto,
            symbol,
            symbol,
            SignalDirection::Long,
            Decimal::from(100),
            created_at,
        );
        signal.stop_loss = Some(Decimal::from(95));
        signal.take_profits = vec![Decimal::from(105), Decimal::from(110)];
        signal
    }

    #[tokio::test]
    async fn test_basic_tier_delay_scenario() {
        let (service, store) = service();
        let created = Utc::now() - Duration::minutes(10);
        store.insert(&active_signal("BTCUSDT", created)).await.unwrap();

        // Ten minutes in: the signal is absent for a 30-minute-delay tier.
        let ctx = service.viewer_context(Uuid::new_v4(), "basic", created + Duration::minutes(10)).await;
        let listed = service.list_signals(&ctx, &SignalFilters::default()).await.unwrap();
        assert!(listed.is_empty());

        // Thirty-one minutes in: present, limited to the basic field set.
        let ctx = service.viewer_context(ctx.viewer_id, "basic", created + Duration::minutes(31)).await;
        let listed = service.list_signals(&ctx, &SignalFilters::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].entry_price, Some(Decimal::from(100)));
        assert!(listed[0].take_profits.is_none());
        assert!(listed[0].rationale.is_none());
    }

    #[tokio::test]
    async fn test_sixth_signal_degrades_for_free_tier() {
        let (service, store) = service();
        let created = Utc::now() - Duration::hours(2);
        for i in 0..6 {
            store
                .insert(&active_signal("BTCUSDT", created + Duration::minutes(i)))
                .await
                .unwrap();
        }

        let ctx = service.viewer_context(Uuid::new_v4(), "free", Utc::now()).await;
        let listed = service.list_signals(&ctx, &SignalFilters::default()).await.unwrap();

        // Quota exhaustion narrows fields, it never hides signals.
        assert_eq!(listed.len(), 6);
        let degraded: Vec<_> = listed.iter().filter(|v| v.quota_limited).collect();
        assert_eq!(degraded.len(), 1);
        assert!(degraded[0].entry_price.is_none());
        assert_eq!(degraded[0].symbol, "BTCUSDT");
    }

    #[tokio::test]
    async fn test_repeat_listing_counts_each_signal_once() {
        let (service, store) = service();
        let created = Utc::now() - Duration::hours(2);
        for i in 0..3 {
            store
                .insert(&active_signal("BTCUSDT", created + Duration::minutes(i)))
                .await
                .unwrap();
        }

        let viewer_id = Uuid::new_v4();
        let now = Utc::now();
        let ctx = service.viewer_context(viewer_id, "free", now).await;
        service.list_signals(&ctx, &SignalFilters::default()).await.unwrap();
        service.list_signals(&ctx, &SignalFilters::default()).await.unwrap();

        let ctx = service.viewer_context(viewer_id, "free", now).await;
        assert_eq!(ctx.views_today, 3);
    }

    #[tokio::test]
    async fn test_export_gated_by_tier() {
        let (service, store) = service();
        let created = Utc::now() - Duration::hours(2);
        store.insert(&active_signal("BTCUSDT", created)).await.unwrap();
        let start = Utc::now() - Duration::days(7);
        let end = Utc::now();

        let pro = service.viewer_context(Uuid::new_v4(), "pro", Utc::now()).await;
        let err = service.export_history(&pro, start, end).await.unwrap_err();
        match err.downcast_ref::<EngineError>() {
            Some(EngineError::ExportNotPermitted { tier }) => assert_eq!(*tier, Tier::Pro),
            other => panic!("unexpected error: {:?}", other),
        }

        let bundle = service.viewer_context(Uuid::new_v4(), "bundle", Utc::now()).await;
        let exported = service.export_history(&bundle, start, end).await.unwrap();
        assert_eq!(exported.len(), 1);
        // Export bypasses field redaction by design.
        assert_eq!(exported[0].entry_price, Decimal::from(100));
    }

    #[tokio::test]
    async fn test_unknown_tier_name_resolves_to_free() {
        let (service, _store) = service();
        let ctx = service.viewer_context(Uuid::new_v4(), "platinum", Utc::now()).await;
        assert_eq!(ctx.tier, Tier::Free);
    }

    /// Store stub that always fails, standing in for an unreachable
    /// persistence collaborator.
    struct DownstreamStore;

    #[async_trait::async_trait]
    impl SignalStore for DownstreamStore {
        async fn insert(&self, _: &Signal) -> Result<()> {
            anyhow::bail!("connection refused")
        }
        async fn get(&self, _: Uuid) -> Result<Option<Signal>> {
            anyhow::bail!("connection refused")
        }
        async fn update(&self, _: &Signal) -> Result<()> {
            anyhow::bail!("connection refused")
        }
        async fn list(&self, _: &SignalFilters) -> Result<Vec<Signal>> {
            anyhow::bail!("connection refused")
        }
        async fn list_range(&self, _: DateTime<Utc>, _: DateTime<Utc>) -> Result<Vec<Signal>> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn test_store_outage_surfaces_as_retryable() {
        let quota = QuotaTracker::new(Arc::new(InMemoryViewRecordStore::new()));
        let service = SignalQueryService::new(Arc::new(DownstreamStore), quota);

        let ctx = service.viewer_context(Uuid::new_v4(), "premium", Utc::now()).await;
        let err = service
            .list_signals(&ctx, &SignalFilters::default())
            .await
            .unwrap_err();
        let engine_err = err.downcast_ref::<EngineError>().expect("engine error");
        assert!(engine_err.is_retryable());
    }

    // Quota accounting failures must not leak into the read path.
    struct BrokenViewStore;

    #[async_trait::async_trait]
    impl ViewRecordStore for BrokenViewStore {
        async fn record(&self, _: Uuid, _: NaiveDate, _: Uuid) -> Result<bool> {
            anyhow::bail!("view store down")
        }
        async fn count(&self, _: Uuid, _: NaiveDate) -> Result<u32> {
            anyhow::bail!("view store down")
        }
    }

    #[tokio::test]
    async fn test_quota_outage_fails_open() {
        let store = Arc::new(InMemorySignalStore::new());
        let created = Utc::now() - Duration::hours(2);
        store.insert(&active_signal("BTCUSDT", created)).await.unwrap();

        let quota = QuotaTracker::new(Arc::new(BrokenViewStore));
        let service = SignalQueryService::new(store, quota);

        let ctx = service.viewer_context(Uuid::new_v4(), "free", Utc::now()).await;
        let listed = service.list_signals(&ctx, &SignalFilters::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].quota_limited);
    }
}

// Quota accounting
// Daily view quota, counted by distinct active signals surfaced per viewer.

use chrono::{DateTime, NaiveDate, Utc};
use common::{Tier, ViewRecordStore};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::policy::entitlement_of;

/// Calendar day of the engine's single reference clock (UTC). Quota resets
/// at 00:00 of this clock; per-viewer timezones are never consulted, which
/// keeps resets deterministic across the deployment.
pub fn day_key(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive()
}

/// Tracks per-viewer daily view counts over a [`ViewRecordStore`].
///
/// Store failures fail open: the viewer is treated as not having consumed
/// quota for that attempt. Availability is deliberately favored over strict
/// quota enforcement.
#[derive(Clone)]
pub struct QuotaTracker {
    store: Arc<dyn ViewRecordStore>,
}

impl QuotaTracker {
    pub fn new(store: Arc<dyn ViewRecordStore>) -> Self {
        Self { store }
    }

    /// Distinct active signals this viewer has been shown today.
    pub async fn count_today(&self, viewer_id: Uuid, now: DateTime<Utc>) -> u32 {
        match self.store.count(viewer_id, day_key(now)).await {
            Ok(count) => count,
            Err(e) => {
                warn!(viewer_id = %viewer_id, "View count unavailable, failing open: {}", e);
                0
            }
        }
    }

    /// Record that an active signal was surfaced to the viewer, then return
    /// the updated count for the day. Idempotent per (viewer, day, signal):
    /// re-fetching the same signal within the day never double-counts.
    pub async fn record_view(&self, viewer_id: Uuid, signal_id: Uuid, now: DateTime<Utc>) -> u32 {
        if let Err(e) = self.store.record(viewer_id, day_key(now), signal_id).await {
            warn!(
                viewer_id = %viewer_id,
                signal_id = %signal_id,
                "View record failed, failing open: {}",
                e
            );
        }
        self.count_today(viewer_id, now).await
    }

    /// Whether `count` exhausts the daily limit for `tier`. Always false
    /// for unlimited tiers.
    pub fn is_exhausted(count: u32, tier: Tier) -> bool {
        match entitlement_of(tier).daily_view_limit {
            Some(limit) => count >= limit,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use common::InMemoryViewRecordStore;
    use chrono::Duration;

    fn tracker() -> QuotaTracker {
        QuotaTracker::new(Arc::new(InMemoryViewRecordStore::new()))
    }

    #[tokio::test]
    async fn test_same_signal_counts_once_per_day() {
        let tracker = tracker();
        let viewer = Uuid::new_v4();
        let signal = Uuid::new_v4();
        let now = Utc::now();

        assert_eq!(tracker.record_view(viewer, signal, now).await, 1);
        assert_eq!(tracker.record_view(viewer, signal, now).await, 1);
        assert_eq!(tracker.count_today(viewer, now).await, 1);

        let other = Uuid::new_v4();
        assert_eq!(tracker.record_view(viewer, other, now).await, 2);
    }

    #[tokio::test]
    async fn test_count_resets_on_day_boundary() {
        let tracker = tracker();
        let viewer = Uuid::new_v4();
        let now = Utc::now();

        tracker.record_view(viewer, Uuid::new_v4(), now).await;
        assert_eq!(tracker.count_today(viewer, now).await, 1);
        assert_eq!(tracker.count_today(viewer, now + Duration::days(1)).await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_duplicates_count_once() {
        let tracker = tracker();
        let viewer = Uuid::new_v4();
        let signal = Uuid::new_v4();
        let now = Utc::now();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move {
                tracker.record_view(viewer, signal, now).await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(tracker.count_today(viewer, now).await, 1);
    }

    #[test]
    fn test_exhaustion_respects_limits() {
        assert!(!QuotaTracker::is_exhausted(4, Tier::Free));
        assert!(QuotaTracker::is_exhausted(5, Tier::Free));
        assert!(!QuotaTracker::is_exhausted(19, Tier::Basic));
        assert!(QuotaTracker::is_exhausted(20, Tier::Basic));
        assert!(!QuotaTracker::is_exhausted(1_000_000, Tier::Premium));
        assert!(!QuotaTracker::is_exhausted(1_000_000, Tier::Bundle));
    }

    /// Store stub whose reads and writes always fail.
    struct BrokenStore;

    #[async_trait::async_trait]
    impl ViewRecordStore for BrokenStore {
        async fn record(&self, _: Uuid, _: NaiveDate, _: Uuid) -> Result<bool> {
            anyhow::bail!("view store down")
        }

        async fn count(&self, _: Uuid, _: NaiveDate) -> Result<u32> {
            anyhow::bail!("view store down")
        }
    }

    #[tokio::test]
    async fn test_store_failure_fails_open() {
        let tracker = QuotaTracker::new(Arc::new(BrokenStore));
        let viewer = Uuid::new_v4();
        let now = Utc::now();

        assert_eq!(tracker.count_today(viewer, now).await, 0);
        assert_eq!(tracker.record_view(viewer, Uuid::new_v4(), now).await, 0);
        assert!(!QuotaTracker::is_exhausted(0, Tier::Free));
    }
}

// In-memory store implementations (for testing and development)

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::{SignalFilters, SignalStore, ViewRecordStore};
use crate::signal::Signal;

/// In-memory signal store.
pub struct InMemorySignalStore {
    signals: tokio::sync::RwLock<HashMap<Uuid, Signal>>,
}

impl InMemorySignalStore {
    pub fn new() -> Self {
        Self {
            signals: tokio::sync::RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySignalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SignalStore for InMemorySignalStore {
    async fn insert(&self, signal: &Signal) -> Result<()> {
        let mut signals = self.signals.write().await;
        signals.insert(signal.id, signal.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Signal>> {
        let signals = self.signals.read().await;
        Ok(signals.get(&id).cloned())
    }

    async fn update(&self, signal: &Signal) -> Result<()> {
        let mut signals = self.signals.write().await;
        if !signals.contains_key(&signal.id) {
            anyhow::bail!("update of unknown signal {}", signal.id);
        }
        signals.insert(signal.id, signal.clone());
        Ok(())
    }

    async fn list(&self, filters: &SignalFilters) -> Result<Vec<Signal>> {
        let signals = self.signals.read().await;
        let mut matched: Vec<Signal> = signals
            .values()
            .filter(|s| filters.matches(s))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filters.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn list_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Signal>> {
        let signals = self.signals.read().await;
        let mut matched: Vec<Signal> = signals
            .values()
            .filter(|s| s.created_at >= start && s.created_at <= end)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matched)
    }
}

/// In-memory view records. Keys views by (viewer, day) with a set of signal
/// ids, so duplicate sightings of one signal collapse to a single record.
pub struct InMemoryViewRecordStore {
    views: tokio::sync::RwLock<HashMap<(Uuid, NaiveDate), HashSet<Uuid>>>,
}

impl InMemoryViewRecordStore {
    pub fn new() -> Self {
        Self {
            views: tokio::sync::RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryViewRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ViewRecordStore for InMemoryViewRecordStore {
    async fn record(&self, viewer_id: Uuid, day: NaiveDate, signal_id: Uuid) -> Result<bool> {
        let mut views = self.views.write().await;
        Ok(views.entry((viewer_id, day)).or_default().insert(signal_id))
    }

    async fn count(&self, viewer_id: Uuid, day: NaiveDate) -> Result<u32> {
        let views = self.views.read().await;
        Ok(views
            .get(&(viewer_id, day))
            .map(|seen| seen.len() as u32)
            .unwrap_or(0))
    }
}

// Store seams
// Persistence is an external collaborator; the engine talks to it through
// these traits. In-memory implementations back tests and development, the
// Postgres implementations back deployments.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::signal::{MarketCategory, Signal, SignalStatus};

mod memory;
mod postgres;

pub use memory::{InMemorySignalStore, InMemoryViewRecordStore};
pub use postgres::{PgSignalStore, PgViewRecordStore};

/// Filters for signal listing. All fields are optional and combine with
/// AND semantics; results come back newest first.
#[derive(Debug, Clone, Default)]
pub struct SignalFilters {
    pub category: Option<MarketCategory>,
    pub symbol: Option<String>,
    pub status: Option<SignalStatus>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl SignalFilters {
    /// All signals still in `Active` status.
    pub fn active() -> Self {
        Self {
            status: Some(SignalStatus::Active),
            ..Default::default()
        }
    }

    /// Active signals for one symbol.
    pub fn active_for_symbol(symbol: impl Into<String>) -> Self {
        Self {
            symbol: Some(symbol.into()),
            status: Some(SignalStatus::Active),
            ..Default::default()
        }
    }

    pub fn matches(&self, signal: &Signal) -> bool {
        if let Some(category) = self.category {
            if signal.category != category {
                return false;
            }
        }
        if let Some(symbol) = &self.symbol {
            if &signal.symbol != symbol {
                return false;
            }
        }
        if let Some(status) = self.status {
            if signal.status != status {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if signal.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if signal.created_at > before {
                return false;
            }
        }
        true
    }
}

/// Signal records keyed by id.
#[async_trait::async_trait]
pub trait SignalStore: Send + Sync {
    /// Persist a newly created signal.
    async fn insert(&self, signal: &Signal) -> Result<()>;

    /// Fetch a signal by id.
    async fn get(&self, id: Uuid) -> Result<Option<Signal>>;

    /// Overwrite an existing signal record (lifecycle mutation).
    async fn update(&self, signal: &Signal) -> Result<()>;

    /// List signals matching the filters, newest first.
    async fn list(&self, filters: &SignalFilters) -> Result<Vec<Signal>>;

    /// Bulk read over a creation-date range, newest first. Backs the
    /// historical export surface.
    async fn list_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Signal>>;
}

/// Per-viewer per-day view identity records backing quota accounting.
///
/// Quota counts view *identities*, not raw hits: the key is the
/// (viewer, day, signal) triple, which is what makes re-fetching the same
/// signal within a day idempotent.
#[async_trait::async_trait]
pub trait ViewRecordStore: Send + Sync {
    /// Record that `viewer_id` was shown `signal_id` on `day`. Returns true
    /// when this is the first sighting of that signal for that viewer and
    /// day. Must be atomic per triple under concurrent calls.
    async fn record(&self, viewer_id: Uuid, day: NaiveDate, signal_id: Uuid) -> Result<bool>;

    /// Number of distinct signals the viewer has been shown on `day`.
    async fn count(&self, viewer_id: Uuid, day: NaiveDate) -> Result<u32>;
}

//! Subscription tiers and the per-request viewer context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Subscription tier, ordered from least to most entitled.
///
/// The derived `Ord` follows declaration order (`free < basic < pro <
/// premium < bundle`) and is the sole basis for "at least tier X" checks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Basic,
    Pro,
    Premium,
    Bundle,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Free,
        Tier::Basic,
        Tier::Pro,
        Tier::Premium,
        Tier::Bundle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Basic => "basic",
            Tier::Pro => "pro",
            Tier::Premium => "premium",
            Tier::Bundle => "bundle",
        }
    }

    /// Resolve a tier name coming from an external source (billing records,
    /// session claims). Unknown or malformed values fall back to `Free`
    /// instead of erroring.
    pub fn resolve(name: &str) -> Tier {
        match name.trim().to_ascii_lowercase().as_str() {
            "free" => Tier::Free,
            "basic" => Tier::Basic,
            "pro" => Tier::Pro,
            "premium" => Tier::Premium,
            "bundle" => Tier::Bundle,
            other => {
                debug!("Unrecognized tier '{}', defaulting to free", other);
                Tier::Free
            }
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is asking. Built per request or per connection from the verified
/// identity, the resolved tier, and the quota state at that instant.
#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub viewer_id: Uuid,
    pub tier: Tier,
    pub views_today: u32,
    pub now: DateTime<Utc>,
}

impl ViewerContext {
    pub fn new(viewer_id: Uuid, tier: Tier, views_today: u32, now: DateTime<Utc>) -> Self {
        Self {
            viewer_id,
            tier,
            views_today,
            now,
        }
    }
}

//! Tier entitlements (Layer: access control)
//!
//! Everything that decides what a viewer gets to see: the per-tier
//! entitlement table, the access evaluator producing redacted projections,
//! and the daily view quota tracker.

pub mod evaluator;
pub mod policy;
pub mod quota;

pub use evaluator::{evaluate, AccessDecision};
pub use policy::{entitlement_of, SignalField, TierEntitlement};
pub use quota::{day_key, QuotaTracker};

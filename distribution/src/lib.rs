//! Distribution (Layer: fan-out)
//!
//! Delivers signal creations and lifecycle transitions to connected
//! viewers, applying per-recipient access evaluation and quota accounting.

pub mod broadcaster;

pub use broadcaster::{
    BroadcasterConfig, Delivery, DeliveryKind, DistributionBroadcaster, Subscription,
};

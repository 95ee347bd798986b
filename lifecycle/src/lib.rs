//! Signal lifecycle (Layer: state machine)
//!
//! Drives signals from `active` to their terminal statuses on market price
//! events: pure threshold-crossing resolution in [`triggers`], the
//! serialized transition engine in [`engine`].

pub mod engine;
pub mod triggers;

pub use engine::{LifecycleConfig, LifecycleEngine};
pub use triggers::{crossed_level, pnl_percent, resolve_batch, Breach, Trigger};

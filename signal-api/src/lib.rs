//! Composed query surface for the signal distribution engine.
//!
//! Glues the store, the entitlement layer, and the quota tracker into the
//! operations presentation collaborators call: tier-aware listing and the
//! entitlement-gated historical export. Also home to the engine's TOML
//! configuration.

pub mod config;
pub mod query;

pub use config::{
    load_config, save_config, DistributionSection, EngineConfig, LifecycleSection,
};
pub use query::SignalQueryService;

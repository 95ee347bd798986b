//! Shared domain model for the signal distribution engine.
//!
//! This crate defines the signal record and its status machine vocabulary,
//! subscription tiers, market price events, the engine error taxonomy, and
//! the persistence seams (`SignalStore`, `ViewRecordStore`) with in-memory
//! and Postgres implementations.

pub mod error;
pub mod events;
pub mod signal;
pub mod store;
pub mod tier;

pub use error::EngineError;
pub use events::{PriceEvent, SignalEvent};
pub use signal::{
    LeverageHint, MarketCategory, Signal, SignalDirection, SignalStatus, SignalView,
};
pub use store::{
    InMemorySignalStore, InMemoryViewRecordStore, PgSignalStore, PgViewRecordStore, SignalFilters,
    SignalStore, ViewRecordStore,
};
pub use tier::{Tier, ViewerContext};

pub use uuid::Uuid;

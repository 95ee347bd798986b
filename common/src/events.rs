//! Events flowing through the engine: market price updates in, signal
//! lifecycle events out.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::signal::{Signal, SignalStatus};

/// A price update for one tracked symbol, delivered by the market-data
/// collaborator at least once per relevant movement. Duplicates and
/// out-of-order delivery are tolerated downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceEvent {
    pub symbol: String,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl PriceEvent {
    pub fn new(symbol: impl Into<String>, price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            timestamp,
        }
    }
}

/// Lifecycle events fanned out to connected viewers. Exactly one event is
/// emitted per signal creation and per status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalEvent {
    Created { signal: Signal },
    Transitioned { signal: Signal, previous: SignalStatus },
}

impl SignalEvent {
    pub fn signal(&self) -> &Signal {
        match self {
            SignalEvent::Created { signal } => signal,
            SignalEvent::Transitioned { signal, .. } => signal,
        }
    }
}

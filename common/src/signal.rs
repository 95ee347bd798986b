// Signal domain model
// The trade recommendation record, its status vocabulary, and the
// tier-redacted projection handed to viewers.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Market category a signal belongs to. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketCategory {
    Crypto,
    Forex,
    Stocks,
    Commodities,
    Indices,
}

impl MarketCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketCategory::Crypto => "crypto",
            MarketCategory::Forex => "forex",
            MarketCategory::Stocks => "stocks",
            MarketCategory::Commodities => "commodities",
            MarketCategory::Indices => "indices",
        }
    }

    pub fn parse(s: &str) -> Option<MarketCategory> {
        match s {
            "crypto" => Some(MarketCategory::Crypto),
            "forex" => Some(MarketCategory::Forex),
            "stocks" => Some(MarketCategory::Stocks),
            "commodities" => Some(MarketCategory::Commodities),
            "indices" => Some(MarketCategory::Indices),
            _ => None,
        }
    }
}

/// Trade direction. `buy`/`sell` are accepted as aliases on input and map
/// to the same two logical values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalDirection {
    #[serde(alias = "buy")]
    Long,
    #[serde(alias = "sell")]
    Short,
}

impl SignalDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalDirection::Long => "long",
            SignalDirection::Short => "short",
        }
    }

    pub fn parse(s: &str) -> Option<SignalDirection> {
        match s {
            "long" | "buy" => Some(SignalDirection::Long),
            "short" | "sell" => Some(SignalDirection::Short),
            _ => None,
        }
    }
}

/// Signal status. `Active` is the only non-terminal state; every other
/// status is final and freezes `closed_at` and `result_pnl_percent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Active,
    HitTp1,
    HitTp2,
    HitTp3,
    HitSl,
    Expired,
}

impl SignalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SignalStatus::Active)
    }

    /// Status for a take-profit hit at `level` (1-based, up to 3).
    pub fn take_profit(level: u8) -> Option<SignalStatus> {
        match level {
            1 => Some(SignalStatus::HitTp1),
            2 => Some(SignalStatus::HitTp2),
            3 => Some(SignalStatus::HitTp3),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::Active => "active",
            SignalStatus::HitTp1 => "hit_tp1",
            SignalStatus::HitTp2 => "hit_tp2",
            SignalStatus::HitTp3 => "hit_tp3",
            SignalStatus::HitSl => "hit_sl",
            SignalStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<SignalStatus> {
        match s {
            "active" => Some(SignalStatus::Active),
            "hit_tp1" => Some(SignalStatus::HitTp1),
            "hit_tp2" => Some(SignalStatus::HitTp2),
            "hit_tp3" => Some(SignalStatus::HitTp3),
            "hit_sl" => Some(SignalStatus::HitSl),
            "expired" => Some(SignalStatus::Expired),
            _ => None,
        }
    }
}

impl std::fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Suggested leverage multipliers for the trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeverageHint {
    pub conservative: u32,
    pub aggressive: u32,
}

/// One trade recommendation. Created by the external producer in `Active`
/// status, mutated only by lifecycle transitions, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub category: MarketCategory,
    pub symbol: String,
    pub symbol_name: String,
    pub direction: SignalDirection,
    pub entry_price: Decimal,
    pub stop_loss: Option<Decimal>,
    /// Take-profit levels ordered by distance from entry, at most three.
    pub take_profits: Vec<Decimal>,
    pub leverage: Option<LeverageHint>,
    /// Confidence score, 1 (weakest) to 5 (strongest).
    pub confidence: u8,
    pub timeframe: String,
    pub rationale: String,
    pub status: SignalStatus,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub result_pnl_percent: Option<Decimal>,
}

impl Signal {
    /// New active signal with the required fields; optional attributes start
    /// empty and are filled in by the producer before publishing.
    pub fn new(
        category: MarketCategory,
        symbol: impl Into<String>,
        symbol_name: impl Into<String>,
        direction: SignalDirection,
        entry_price: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            category,
            symbol: symbol.into(),
            symbol_name: symbol_name.into(),
            direction,
            entry_price,
            stop_loss: None,
            take_profits: Vec::new(),
            leverage: None,
            confidence: 3,
            timeframe: String::new(),
            rationale: String::new(),
            status: SignalStatus::Active,
            created_at,
            closed_at: None,
            result_pnl_percent: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SignalStatus::Active
    }

    /// Take-profit price at `level` (1-based).
    pub fn take_profit(&self, level: u8) -> Option<Decimal> {
        if level == 0 {
            return None;
        }
        self.take_profits.get(level as usize - 1).copied()
    }

    /// Check record consistency: `closed_at` and `result_pnl_percent` are
    /// set exactly when the status is terminal, confidence stays in 1..=5,
    /// and at most three take-profit levels are present.
    pub fn validate(&self) -> Result<()> {
        if self.status.is_terminal() != self.closed_at.is_some() {
            anyhow::bail!(
                "signal {}: closed_at must be set iff status is terminal (status={})",
                self.id,
                self.status
            );
        }
        if self.status.is_terminal() != self.result_pnl_percent.is_some() {
            anyhow::bail!(
                "signal {}: result_pnl_percent must be set iff status is terminal (status={})",
                self.id,
                self.status
            );
        }
        if !(1..=5).contains(&self.confidence) {
            anyhow::bail!("signal {}: confidence {} out of range", self.id, self.confidence);
        }
        if self.take_profits.len() > 3 {
            anyhow::bail!(
                "signal {}: {} take-profit levels, at most 3 supported",
                self.id,
                self.take_profits.len()
            );
        }
        Ok(())
    }
}

/// Tier-redacted projection of a signal.
///
/// The public skeleton (identity, category, symbol, direction, status,
/// creation time) is always present. Gated fields are omitted rather than
/// zeroed so a consumer can tell "not entitled" from "value is zero".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalView {
    pub id: Uuid,
    pub category: MarketCategory,
    pub symbol: String,
    pub symbol_name: String,
    pub direction: SignalDirection,
    pub status: SignalStatus,
    pub created_at: DateTime<Utc>,
    /// True when quota exhaustion degraded this projection to the free
    /// field set.
    #[serde(default)]
    pub quota_limited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profits: Option<Vec<Decimal>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leverage: Option<LeverageHint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_pnl_percent: Option<Decimal>,
}

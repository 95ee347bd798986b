// Tier policy
// The entitlement table: what each subscription tier may see and do.

use common::Tier;
use serde::{Deserialize, Serialize};

/// Field categories gated on an active signal. The public skeleton
/// (identity, category, symbol, direction, status, creation time) is never
/// gated and is not listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalField {
    EntryPrice,
    StopLoss,
    TakeProfits,
    Leverage,
    Confidence,
    Timeframe,
    Rationale,
}

/// The concrete limits and visibilities attached to one tier. Immutable,
/// defined at process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierEntitlement {
    /// Positive: an active signal stays hidden until this many minutes after
    /// creation. Zero: real-time. Negative: visible before the nominal
    /// release instant (pre-release window, top tier only).
    pub delay_minutes: i64,
    /// `None` = unlimited.
    pub daily_view_limit: Option<u32>,
    /// Field categories visible on an active signal.
    pub visible_fields: &'static [SignalField],
    /// Gates bulk historical export.
    pub can_export_history: bool,
}

impl TierEntitlement {
    pub fn allows(&self, field: SignalField) -> bool {
        self.visible_fields.contains(&field)
    }
}

const FREE_FIELDS: &[SignalField] = &[];

const BASIC_FIELDS: &[SignalField] = &[
    SignalField::EntryPrice,
    SignalField::StopLoss,
    SignalField::Confidence,
    SignalField::Timeframe,
];

const PRO_FIELDS: &[SignalField] = &[
    SignalField::EntryPrice,
    SignalField::StopLoss,
    SignalField::TakeProfits,
    SignalField::Leverage,
    SignalField::Confidence,
    SignalField::Timeframe,
];

const ALL_FIELDS: &[SignalField] = &[
    SignalField::EntryPrice,
    SignalField::StopLoss,
    SignalField::TakeProfits,
    SignalField::Leverage,
    SignalField::Confidence,
    SignalField::Timeframe,
    SignalField::Rationale,
];

/// Entitlement for a tier. Pure and total: every tier has a defined row and
/// there is no failure mode. Unknown tier names are already resolved to
/// `Free` at the string boundary (`Tier::resolve`).
pub const fn entitlement_of(tier: Tier) -> TierEntitlement {
    match tier {
        Tier::Free => TierEntitlement {
            delay_minutes: 60,
            daily_view_limit: Some(5),
            visible_fields: FREE_FIELDS,
            can_export_history: false,
        },
        Tier::Basic => TierEntitlement {
            delay_minutes: 30,
            daily_view_limit: Some(20),
            visible_fields: BASIC_FIELDS,
            can_export_history: false,
        },
        Tier::Pro => TierEntitlement {
            delay_minutes: 10,
            daily_view_limit: Some(100),
            visible_fields: PRO_FIELDS,
            can_export_history: false,
        },
        Tier::Premium => TierEntitlement {
            delay_minutes: 0,
            daily_view_limit: None,
            visible_fields: ALL_FIELDS,
            can_export_history: true,
        },
        Tier::Bundle => TierEntitlement {
            delay_minutes: -5,
            daily_view_limit: None,
            visible_fields: ALL_FIELDS,
            can_export_history: true,
        },
    }
}

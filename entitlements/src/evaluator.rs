// Access evaluation
// Decides, per signal and per viewer, whether the signal is visible and
// which redacted projection that viewer receives.

use chrono::{DateTime, Duration, Utc};
use common::{Signal, SignalView, Tier};
use tracing::debug;

use crate::policy::{entitlement_of, SignalField, TierEntitlement};

/// Outcome of evaluating one signal for one viewer.
#[derive(Debug, Clone)]
pub struct AccessDecision {
    pub visible: bool,
    /// The projection to deliver; present exactly when `visible` is true.
    pub view: Option<SignalView>,
}

impl AccessDecision {
    fn hidden() -> Self {
        Self {
            visible: false,
            view: None,
        }
    }

    fn shown(view: SignalView) -> Self {
        Self {
            visible: true,
            view: Some(view),
        }
    }
}

/// Evaluate `signal` for a viewer of `viewer_tier` at `now`.
///
/// Completed signals are visible to every tier with outcome fields intact.
/// Active signals pass the tier's delay gate first; quota exhaustion then
/// degrades the field set to the free entitlement without ever hiding the
/// signal. Total over valid inputs, never panics.
pub fn evaluate(
    signal: &Signal,
    viewer_tier: Tier,
    quota_exhausted: bool,
    now: DateTime<Utc>,
) -> AccessDecision {
    let entitlement = entitlement_of(viewer_tier);

    if signal.status.is_terminal() {
        return AccessDecision::shown(project_completed(signal, &entitlement));
    }

    // Delay gate. A non-negative delay also keeps pre-released signals
    // (created_at still in the future) hidden until their nominal instant;
    // only a negative delay opens that window early.
    if entitlement.delay_minutes >= 0 {
        let release_at = signal.created_at + Duration::minutes(entitlement.delay_minutes);
        if now < release_at {
            debug!(
                signal_id = %signal.id,
                tier = %viewer_tier,
                "Signal still inside delay window"
            );
            return AccessDecision::hidden();
        }
    }

    let (fields, quota_limited) = if quota_exhausted {
        (entitlement_of(Tier::Free).visible_fields, true)
    } else {
        (entitlement.visible_fields, false)
    };

    AccessDecision::shown(project_active(signal, fields, quota_limited))
}

/// Public skeleton every viewer gets: identity, classification, direction,
/// status, and creation time. Everything gated starts omitted.
fn skeleton(signal: &Signal, quota_limited: bool) -> SignalView {
    SignalView {
        id: signal.id,
        category: signal.category,
        symbol: signal.symbol.clone(),
        symbol_name: signal.symbol_name.clone(),
        direction: signal.direction,
        status: signal.status,
        created_at: signal.created_at,
        quota_limited,
        entry_price: None,
        stop_loss: None,
        take_profits: None,
        leverage: None,
        confidence: None,
        timeframe: None,
        rationale: None,
        closed_at: None,
        result_pnl_percent: None,
    }
}

fn project_active(signal: &Signal, fields: &[SignalField], quota_limited: bool) -> SignalView {
    let mut view = skeleton(signal, quota_limited);
    let allow = |field: SignalField| fields.contains(&field);

    if allow(SignalField::EntryPrice) {
        view.entry_price = Some(signal.entry_price);
    }
    if allow(SignalField::StopLoss) {
        view.stop_loss = signal.stop_loss;
    }
    if allow(SignalField::TakeProfits) && !signal.take_profits.is_empty() {
        view.take_profits = Some(signal.take_profits.clone());
    }
    if allow(SignalField::Leverage) {
        view.leverage = signal.leverage;
    }
    if allow(SignalField::Confidence) {
        view.confidence = Some(signal.confidence);
    }
    if allow(SignalField::Timeframe) {
        view.timeframe = Some(signal.timeframe.clone());
    }
    if allow(SignalField::Rationale) {
        view.rationale = Some(signal.rationale.clone());
    }
    view
}

/// Transparency override for completed signals: trade levels and the
/// outcome are exposed to every tier; analytic extras stay gated.
fn project_completed(signal: &Signal, entitlement: &TierEntitlement) -> SignalView {
    let mut view = skeleton(signal, false);
    view.entry_price = Some(signal.entry_price);
    view.stop_loss = signal.stop_loss;
    if !signal.take_profits.is_empty() {
        view.take_profits = Some(signal.take_profits.clone());
    }
    view.closed_at = signal.closed_at;
    view.result_pnl_percent = signal.result_pnl_percent;

    if entitlement.allows(SignalField::Leverage) {
        view.leverage = signal.leverage;
    }
    if entitlement.allows(SignalField::Confidence) {
        view.confidence = Some(signal.confidence);
    }
    if entitlement.allows(SignalField::Timeframe) {
        view.timeframe = Some(signal.timeframe.clone());
    }
    if entitlement.allows(SignalField::Rationale) {
        view.rationale = Some(signal.rationale.clone());
    }
    view
}

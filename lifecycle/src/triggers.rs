// Trigger resolution
// Pure price-crossing logic: which threshold a price update breaches and
// how simultaneous crossings resolve.

use chrono::{DateTime, Utc};
use common::{PriceEvent, Signal, SignalDirection, SignalStatus};
use rust_decimal::Decimal;

/// A threshold breached by a price update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breach {
    /// Take-profit level, 1-based, at most 3.
    TakeProfit(u8),
    StopLoss,
}

impl Breach {
    pub fn status(self) -> SignalStatus {
        match self {
            Breach::TakeProfit(1) => SignalStatus::HitTp1,
            Breach::TakeProfit(2) => SignalStatus::HitTp2,
            Breach::TakeProfit(_) => SignalStatus::HitTp3,
            Breach::StopLoss => SignalStatus::HitSl,
        }
    }

    /// Resolution priority for equal timestamps: stop-loss first
    /// (conservative bias), then the furthest take-profit.
    fn rank(self) -> u8 {
        match self {
            Breach::StopLoss => 0,
            Breach::TakeProfit(level) => 4 - level.min(3),
        }
    }
}

/// The resolved transition trigger for one signal.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub breach: Breach,
    pub price: Decimal,
    pub at: DateTime<Utc>,
}

/// Which threshold a single price crosses for `signal`, if any.
///
/// The stop-loss is checked first; among take-profit levels the furthest
/// crossed level wins (tp3 > tp2 > tp1).
pub fn crossed_level(signal: &Signal, price: Decimal) -> Option<Breach> {
    let levels = signal.take_profits.len() as u8;
    match signal.direction {
        SignalDirection::Long => {
            if let Some(stop) = signal.stop_loss {
                if price <= stop {
                    return Some(Breach::StopLoss);
                }
            }
            for level in (1..=levels).rev() {
                if let Some(target) = signal.take_profit(level) {
                    if price >= target {
                        return Some(Breach::TakeProfit(level));
                    }
                }
            }
            None
        }
        SignalDirection::Short => {
            if let Some(stop) = signal.stop_loss {
                if price >= stop {
                    return Some(Breach::StopLoss);
                }
            }
            for level in (1..=levels).rev() {
                if let Some(target) = signal.take_profit(level) {
                    if price <= target {
                        return Some(Breach::TakeProfit(level));
                    }
                }
            }
            None
        }
    }
}

/// Resolve one evaluation window of price updates to at most one trigger.
///
/// Updates may arrive out of order; the breach with the earliest timestamp
/// wins. Equal timestamps resolve to the stop-loss, then to the furthest
/// take-profit. Events for other symbols are ignored.
pub fn resolve_batch(signal: &Signal, events: &[PriceEvent]) -> Option<Trigger> {
    events
        .iter()
        .filter(|event| event.symbol == signal.symbol)
        .filter_map(|event| crossed_level(signal, event.price).map(|breach| (event, breach)))
        .min_by_key(|(event, breach)| (event.timestamp, breach.rank()))
        .map(|(event, breach)| Trigger {
            breach,
            price: event.price,
            at: event.timestamp,
        })
}

/// Signed percent change from entry to exit, positive when the move favors
/// the direction. Rounded to two decimal places.
pub fn pnl_percent(direction: SignalDirection, entry: Decimal, exit: Decimal) -> Decimal {
    if entry.is_zero() {
        return Decimal::ZERO;
    }
    let change = match direction {
        SignalDirection::Long => (exit - entry) / entry,
        SignalDirection::Short => (entry - exit) / entry,
    };
    (change * Decimal::from(100)).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::MarketCategory;

    fn long_signal() -> Signal {
        let mut signal = Signal::new(
            MarketCategory::Crypto,
            "BTCUSDT",
            "Bitcoin",
            SignalDirection::Long,
            Decimal::from(100),
            Utc::now(),
        );
        signal.stop_loss = Some(Decimal::from(95));
        signal.take_profits = vec![
            Decimal::from(105),
            Decimal::from(110),
            Decimal::from(115),
        ];
        signal
    }

    fn short_signal() -> Signal {
        let mut signal = long_signal();
        signal.direction = SignalDirection::Short;
        signal.stop_loss = Some(Decimal::from(105));
        signal.take_profits = vec![Decimal::from(95), Decimal::from(90), Decimal::from(85)];
        signal
    }

    #[test]
    fn test_furthest_take_profit_wins() {
        let signal = long_signal();
        assert_eq!(
            crossed_level(&signal, Decimal::from(116)),
            Some(Breach::TakeProfit(3))
        );
        assert_eq!(
            crossed_level(&signal, Decimal::from(111)),
            Some(Breach::TakeProfit(2))
        );
        assert_eq!(
            crossed_level(&signal, Decimal::from(105)),
            Some(Breach::TakeProfit(1))
        );
        assert_eq!(crossed_level(&signal, Decimal::from(101)), None);
    }

    #[test]
    fn test_stop_loss_crossing() {
        let signal = long_signal();
        assert_eq!(
            crossed_level(&signal, Decimal::from(94)),
            Some(Breach::StopLoss)
        );

        let signal = short_signal();
        assert_eq!(
            crossed_level(&signal, Decimal::from(106)),
            Some(Breach::StopLoss)
        );
        assert_eq!(
            crossed_level(&signal, Decimal::from(84)),
            Some(Breach::TakeProfit(3))
        );
    }

    #[test]
    fn test_earliest_breach_wins_out_of_order() {
        let signal = long_signal();
        let t0 = Utc::now();
        // Delivered out of order: the later tp3 print arrives first.
        let events = vec![
            PriceEvent::new("BTCUSDT", Decimal::from(116), t0 + Duration::seconds(30)),
            PriceEvent::new("BTCUSDT", Decimal::from(106), t0),
        ];
        let trigger = resolve_batch(&signal, &events).unwrap();
        assert_eq!(trigger.breach, Breach::TakeProfit(1));
        assert_eq!(trigger.at, t0);
    }

    #[test]
    fn test_simultaneous_tp_and_sl_resolves_to_stop_loss() {
        let signal = long_signal();
        let t0 = Utc::now();
        let events = vec![
            PriceEvent::new("BTCUSDT", Decimal::from(106), t0),
            PriceEvent::new("BTCUSDT", Decimal::from(94), t0),
        ];
        let trigger = resolve_batch(&signal, &events).unwrap();
        assert_eq!(trigger.breach, Breach::StopLoss);
    }

    #[test]
    fn test_simultaneous_tps_resolve_to_furthest() {
        let signal = long_signal();
        let t0 = Utc::now();
        let events = vec![
            PriceEvent::new("BTCUSDT", Decimal::from(105), t0),
            PriceEvent::new("BTCUSDT", Decimal::from(116), t0),
        ];
        let trigger = resolve_batch(&signal, &events).unwrap();
        assert_eq!(trigger.breach, Breach::TakeProfit(3));
    }

    #[test]
    fn test_other_symbols_ignored() {
        let signal = long_signal();
        let events = vec![PriceEvent::new("ETHUSDT", Decimal::from(116), Utc::now())];
        assert!(resolve_batch(&signal, &events).is_none());
    }

    #[test]
    fn test_pnl_sign_follows_direction() {
        assert_eq!(
            pnl_percent(SignalDirection::Long, Decimal::from(100), Decimal::from(116)),
            Decimal::new(1600, 2) // +16.00
        );
        assert_eq!(
            pnl_percent(SignalDirection::Short, Decimal::from(100), Decimal::from(116)),
            Decimal::new(-1600, 2)
        );
        assert_eq!(
            pnl_percent(SignalDirection::Short, Decimal::from(100), Decimal::from(90)),
            Decimal::new(1000, 2)
        );
        assert_eq!(
            pnl_percent(SignalDirection::Long, Decimal::ZERO, Decimal::from(10)),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_breach_status_mapping() {
        assert_eq!(Breach::TakeProfit(1).status(), SignalStatus::HitTp1);
        assert_eq!(Breach::TakeProfit(3).status(), SignalStatus::HitTp3);
        assert_eq!(Breach::StopLoss.status(), SignalStatus::HitSl);
    }
}

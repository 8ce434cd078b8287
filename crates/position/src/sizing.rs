// In crates/position/src/sizing.rs

//! Deterministic position sizing: capital allocation, leverage and trailing
//! distance are all pure functions of confidence, position type and equity.

use core_types::PositionType;
use num_traits::FromPrimitive;
use rust_decimal::Decimal;

/// Everything the executor needs to turn an approved entry into an order.
#[derive(Debug, Clone, PartialEq)]
pub struct SizingOutcome {
    /// Margin committed to the trade, before leverage.
    pub capital: Decimal,
    pub leverage: f64,
    /// `capital * leverage`.
    pub notional: Decimal,
    /// `notional / price`, in the base asset.
    pub quantity: Decimal,
    pub trailing_pct: f64,
}

/// Fraction of account equity allocated to a new entry.
///
/// Swing trades commit more capital than scalps at every confidence band.
pub fn capital_allocation_pct(position_type: PositionType, confidence: f64) -> f64 {
    match position_type {
        PositionType::Swing => {
            if confidence >= 0.8 {
                0.25
            } else if confidence >= 0.6 {
                0.12
            } else {
                0.06
            }
        }
        PositionType::Scalp => {
            if confidence >= 0.8 {
                0.15
            } else if confidence >= 0.6 {
                0.10
            } else {
                0.05
            }
        }
    }
}

/// Confidence-scaled leverage. High-conviction decisions borrow more; anything
/// below 0.6 confidence trades unlevered.
pub fn leverage_multiplier(confidence: f64) -> f64 {
    if confidence >= 0.9 {
        3.0
    } else if confidence >= 0.8 {
        2.0
    } else if confidence >= 0.7 {
        1.5
    } else if confidence >= 0.6 {
        1.2
    } else {
        1.0
    }
}

/// Account-size ceiling on leverage. Small accounts are kept near 1x no matter
/// how confident the oracle is; only accounts above $10k see the configured max.
pub fn tier_ceiling(equity: Decimal, configured_max: f64) -> f64 {
    if equity < Decimal::from(500) {
        1.0
    } else if equity < Decimal::from(1_000) {
        1.5
    } else if equity < Decimal::from(5_000) {
        2.0
    } else if equity < Decimal::from(10_000) {
        2.5
    } else {
        configured_max
    }
}

/// Trailing-stop distance as a fraction of price. Looser for low-confidence
/// entries so noise does not shake them out immediately.
pub fn trailing_stop_pct(confidence: f64) -> f64 {
    if confidence >= 0.8 {
        0.10
    } else if confidence >= 0.6 {
        0.12
    } else {
        0.15
    }
}

/// Size a new entry. Returns `None` when the price is non-positive or the
/// resulting quantity would be zero.
///
/// The allocation is clamped to `max_equity_usage` before leverage is applied,
/// and leverage is clamped to the account-tier ceiling, so the outcome never
/// exceeds what the risk rules would approve.
pub fn size_position(
    position_type: PositionType,
    confidence: f64,
    equity: Decimal,
    price: Decimal,
    max_equity_usage: f64,
    configured_max_leverage: f64,
) -> Option<SizingOutcome> {
    if price <= Decimal::ZERO || equity <= Decimal::ZERO {
        return None;
    }

    let allocation = capital_allocation_pct(position_type, confidence).min(max_equity_usage);
    let leverage = leverage_multiplier(confidence).min(tier_ceiling(equity, configured_max_leverage));

    let allocation_dec = Decimal::from_f64(allocation)?;
    let leverage_dec = Decimal::from_f64(leverage)?;

    let capital = equity * allocation_dec;
    let notional = capital * leverage_dec;
    let quantity = notional / price;
    if quantity <= Decimal::ZERO {
        return None;
    }

    Some(SizingOutcome {
        capital,
        leverage,
        notional,
        quantity,
        trailing_pct: trailing_stop_pct(confidence),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn swing_allocates_more_than_scalp_in_every_band() {
        for confidence in [0.95, 0.7, 0.3] {
            let swing = capital_allocation_pct(PositionType::Swing, confidence);
            let scalp = capital_allocation_pct(PositionType::Scalp, confidence);
            assert!(swing > scalp, "confidence {confidence}");
        }
    }

    #[test]
    fn confidence_buckets_pin_exact_allocation_and_trailing_values() {
        // High conviction: 25%/15% capital, tightest 10% trail.
        assert_eq!(capital_allocation_pct(PositionType::Swing, 0.85), 0.25);
        assert_eq!(capital_allocation_pct(PositionType::Scalp, 0.85), 0.15);
        assert_eq!(trailing_stop_pct(0.85), 0.10);

        // Medium conviction: 12%/10% capital, 12% trail.
        assert_eq!(capital_allocation_pct(PositionType::Swing, 0.65), 0.12);
        assert_eq!(capital_allocation_pct(PositionType::Scalp, 0.65), 0.10);
        assert_eq!(trailing_stop_pct(0.65), 0.12);

        // Low conviction: 6%/5% capital, widest 15% trail.
        assert_eq!(capital_allocation_pct(PositionType::Swing, 0.4), 0.06);
        assert_eq!(capital_allocation_pct(PositionType::Scalp, 0.4), 0.05);
        assert_eq!(trailing_stop_pct(0.4), 0.15);
    }

    #[test]
    fn leverage_multiplier_is_monotone_in_confidence() {
        assert_eq!(leverage_multiplier(0.95), 3.0);
        assert_eq!(leverage_multiplier(0.85), 2.0);
        assert_eq!(leverage_multiplier(0.75), 1.5);
        assert_eq!(leverage_multiplier(0.65), 1.2);
        assert_eq!(leverage_multiplier(0.5), 1.0);
    }

    #[test]
    fn small_accounts_stay_unlevered() {
        // A $400 account at maximum confidence still trades 1x.
        let outcome = size_position(
            PositionType::Swing,
            0.95,
            dec!(400),
            dec!(100),
            1.0,
            10.0,
        )
        .unwrap();
        assert_eq!(outcome.leverage, 1.0);
        assert_eq!(outcome.notional, dec!(100)); // 400 * 0.25 * 1.0
        assert_eq!(outcome.quantity, dec!(1));
    }

    #[test]
    fn large_account_uses_confidence_multiplier() {
        let outcome = size_position(
            PositionType::Swing,
            0.95,
            dec!(20_000),
            dec!(100),
            1.0,
            10.0,
        )
        .unwrap();
        assert_eq!(outcome.leverage, 3.0);
        assert_eq!(outcome.capital, dec!(5000));
        assert_eq!(outcome.notional, dec!(15000));
    }

    #[test]
    fn allocation_is_clamped_to_max_equity_usage() {
        let outcome = size_position(
            PositionType::Swing,
            0.95,
            dec!(1000),
            dec!(100),
            0.10,
            10.0,
        )
        .unwrap();
        // Bucket says 25%, config caps at 10%.
        assert_eq!(outcome.capital, dec!(100.0));
    }

    #[test]
    fn non_positive_price_yields_no_size() {
        assert!(size_position(PositionType::Scalp, 0.7, dec!(1000), dec!(0), 1.0, 5.0).is_none());
        assert!(size_position(PositionType::Scalp, 0.7, dec!(1000), dec!(-5), 1.0, 5.0).is_none());
    }

    #[test]
    fn trailing_distance_widens_as_confidence_drops() {
        assert_eq!(trailing_stop_pct(0.9), 0.10);
        assert_eq!(trailing_stop_pct(0.7), 0.12);
        assert_eq!(trailing_stop_pct(0.4), 0.15);
    }
}

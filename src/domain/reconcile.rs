//! Reconciliation arithmetic - Delta, Percentage, and Clamping
//!
//! Pure functions that turn an incoming quote price and the previous
//! feed price into a classified movement. The percentage clamp matches
//! the bounds of fixed-precision `DECIMAL(8,2)` storage so values stay
//! portable to such columns, even though `Decimal` itself would not
//! overflow.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::feed::Movement;

/// Upper clamp bound for `change_pct_24h`.
pub const MAX_CHANGE_PCT: Decimal = dec!(999999.99);

/// Lower clamp bound for `change_pct_24h`.
pub const MIN_CHANGE_PCT: Decimal = dec!(-999999.99);

/// Outcome of reconciling one quote against the feed store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileResult {
    /// First quote for a previously-unseen symbol; feed created, no
    /// history point, no movement.
    Created,
    /// Incoming price equals the stored price; no effects.
    Unchanged,
    /// Price changed; feed rewritten with the given delta.
    Updated {
        delta: Decimal,
        pct: Decimal,
        movement: Movement,
    },
}

/// Percentage change of `delta` relative to `old_price`, rounded to
/// two decimal places and clamped.
///
/// A zero or negative `old_price` yields zero (divide-by-zero guard;
/// feeds never store non-positive prices, but a quote may race a
/// freshly-seeded feed in tests).
pub fn change_pct(delta: Decimal, old_price: Decimal) -> Decimal {
    if old_price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    clamp_pct((delta / old_price * dec!(100)).round_dp(2))
}

/// Clamp a percentage into the storage bounds.
pub fn clamp_pct(pct: Decimal) -> Decimal {
    pct.clamp(MIN_CHANGE_PCT, MAX_CHANGE_PCT)
}

/// Classify a price delta into a movement direction.
pub fn classify(delta: Decimal) -> Movement {
    if delta > Decimal::ZERO {
        Movement::Increase
    } else if delta < Decimal::ZERO {
        Movement::Decrease
    } else {
        Movement::Unchanged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pct_basic_increase() {
        // $45,000 -> $46,350 is +3.00%
        let delta = dec!(1350);
        assert_eq!(change_pct(delta, dec!(45000)), dec!(3.00));
        assert_eq!(classify(delta), Movement::Increase);
    }

    #[test]
    fn test_pct_decrease() {
        let delta = dec!(-100);
        assert_eq!(change_pct(delta, dec!(2000)), dec!(-5.00));
        assert_eq!(classify(delta), Movement::Decrease);
    }

    #[test]
    fn test_pct_divide_by_zero_guard() {
        assert_eq!(change_pct(dec!(10), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_pct_clamped_at_bounds() {
        // A microscopic old price produces an absurd percentage; the
        // clamp holds it at the storage bound.
        let pct = change_pct(dec!(1000000), dec!(0.0001));
        assert_eq!(pct, MAX_CHANGE_PCT);

        let pct = change_pct(dec!(-1000000), dec!(0.0001));
        assert_eq!(pct, MIN_CHANGE_PCT);
    }

    #[test]
    fn test_pct_rounds_to_two_places() {
        // 1/3 of 100% = 33.333...% -> 33.33
        assert_eq!(change_pct(dec!(1), dec!(3)), dec!(33.33));
    }

    #[test]
    fn test_classify_zero_is_unchanged() {
        assert_eq!(classify(Decimal::ZERO), Movement::Unchanged);
    }
}

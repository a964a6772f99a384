//! Property-Based Tests — Domain Layer Invariants
//!
//! Uses `proptest` to verify that the reconciliation arithmetic and
//! the synthetic generator maintain their invariants across random
//! inputs.

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use pricefeed_engine::domain::feed::{Movement, MovementStats};
use pricefeed_engine::domain::reconcile::{
    change_pct, classify, MAX_CHANGE_PCT, MIN_CHANGE_PCT,
};
use pricefeed_engine::domain::synthetic::SyntheticGenerator;

/// Decimal with two fractional digits from an i64 mantissa.
fn cents(mantissa: i64) -> Decimal {
    Decimal::new(mantissa, 2)
}

// ── Reconciliation Properties ───────────────────────────────

proptest! {
    /// The clamped percentage always stays within the storage bounds,
    /// no matter how extreme the move.
    #[test]
    fn change_pct_always_within_clamp_bounds(
        delta_cents in -1_000_000_000_000i64..1_000_000_000_000,
        old_cents in 1i64..1_000_000_000_000,
    ) {
        let pct = change_pct(cents(delta_cents), cents(old_cents));
        prop_assert!(pct >= MIN_CHANGE_PCT, "pct {pct} below lower bound");
        prop_assert!(pct <= MAX_CHANGE_PCT, "pct {pct} above upper bound");
    }

    /// A non-positive previous price never produces a percentage
    /// (divide-by-zero guard).
    #[test]
    fn change_pct_guards_non_positive_old_price(
        delta_cents in -1_000_000i64..1_000_000,
        old_cents in -1_000_000i64..=0,
    ) {
        let pct = change_pct(cents(delta_cents), cents(old_cents));
        prop_assert_eq!(pct, Decimal::ZERO);
    }

    /// Movement classification matches the sign of the delta.
    #[test]
    fn classify_matches_delta_sign(delta_cents in -1_000_000i64..1_000_000) {
        let delta = cents(delta_cents);
        let movement = classify(delta);
        if delta_cents > 0 {
            prop_assert_eq!(movement, Movement::Increase);
        } else if delta_cents < 0 {
            prop_assert_eq!(movement, Movement::Decrease);
        } else {
            prop_assert_eq!(movement, Movement::Unchanged);
        }
    }

    /// Percentage sign agrees with the classification for sane prices.
    #[test]
    fn change_pct_sign_agrees_with_classification(
        delta_cents in -1_000_000i64..1_000_000,
        old_cents in 100i64..100_000_000,
    ) {
        let delta = cents(delta_cents);
        let pct = change_pct(delta, cents(old_cents));
        match classify(delta) {
            Movement::Increase => prop_assert!(pct >= Decimal::ZERO),
            Movement::Decrease => prop_assert!(pct <= Decimal::ZERO),
            Movement::Unchanged => prop_assert_eq!(pct, Decimal::ZERO),
        }
    }
}

// ── Synthetic Generator Properties ──────────────────────────

proptest! {
    /// Synthetic quotes stay within ±5% of the last known price and
    /// are always positive.
    #[test]
    fn synthetic_walk_bounded_and_positive(
        last_cents in 1i64..1_000_000_000,
        cycle in 0u64..10_000,
    ) {
        let generator = SyntheticGenerator::default();
        let last = cents(last_cents);
        let quote = generator.generate(&"SYM".to_string(), last, cycle, Utc::now());

        prop_assert!(quote.price > Decimal::ZERO);

        let upper = (last * dec!(1.05)).round_dp(2) + dec!(0.01);
        let lower = ((last * dec!(0.95)).round_dp(2) - dec!(0.01)).max(dec!(0.01));
        prop_assert!(quote.price <= upper, "price {} above {}", quote.price, upper);
        prop_assert!(quote.price >= lower, "price {} below {}", quote.price, lower);
    }

    /// The generator is deterministic in (symbol, cycle).
    #[test]
    fn synthetic_walk_deterministic(
        last_cents in 1i64..1_000_000_000,
        cycle in 0u64..10_000,
    ) {
        let generator = SyntheticGenerator::default();
        let last = cents(last_cents);
        let now = Utc::now();
        let a = generator.generate(&"SYM".to_string(), last, cycle, now);
        let b = generator.generate(&"SYM".to_string(), last, cycle, now);
        prop_assert_eq!(a.price, b.price);
        prop_assert_eq!(a.change_24h, b.change_24h);
    }
}

// ── Movement Counter Properties ─────────────────────────────

proptest! {
    /// The counter total is monotonically non-decreasing across any
    /// sequence of recorded movements, and ends equal to the number
    /// of events.
    #[test]
    fn movement_counters_monotonic(kinds in prop::collection::vec(0u8..3, 1..200)) {
        let mut stats = MovementStats::new("SYM", Utc::now().date_naive());
        let mut last_total = 0;

        for kind in &kinds {
            let movement = match kind {
                0 => Movement::Increase,
                1 => Movement::Decrease,
                _ => Movement::Unchanged,
            };
            stats.bump(movement);
            let total = stats.total();
            prop_assert!(total > last_total);
            last_total = total;
        }

        prop_assert_eq!(stats.total(), kinds.len() as u64);
        prop_assert_eq!(
            stats.increases + stats.decreases + stats.unchanged,
            kinds.len() as u64
        );
    }

    /// Net movement is always bounded by the total.
    #[test]
    fn net_movement_bounded_by_total(kinds in prop::collection::vec(0u8..3, 0..200)) {
        let mut stats = MovementStats::new("SYM", Utc::now().date_naive());
        for kind in &kinds {
            stats.bump(match kind {
                0 => Movement::Increase,
                1 => Movement::Decrease,
                _ => Movement::Unchanged,
            });
        }
        prop_assert!(stats.net().unsigned_abs() <= stats.total());
    }
}

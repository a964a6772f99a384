//! Synthetic Quote Generator - Deterministic Last-Resort Pricing
//!
//! Bottom rung of the fallback chain. When every real provider fails
//! for a symbol, a seeded random walk around the last known price keeps
//! the feed store supplied so total provider outage degrades gracefully
//! instead of freezing downstream consumers.
//!
//! Determinism: the seed is derived from the symbol and the cycle
//! number, so the same (symbol, cycle) always produces the same quote.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal_macros::dec;

use super::feed::{Quote, Symbol};

/// Source name stamped on synthetic quotes.
pub const SYNTHETIC_SOURCE: &str = "synthetic";

/// Deterministic-seeded random-walk quote generator.
#[derive(Debug, Clone)]
pub struct SyntheticGenerator {
    /// Maximum walk magnitude as a fraction (0.05 = ±5%).
    max_walk: f64,
}

impl SyntheticGenerator {
    /// Create a generator with the given walk bound.
    pub fn new(max_walk: f64) -> Self {
        Self {
            max_walk: max_walk.abs().min(0.05),
        }
    }

    /// Generate a quote walking from the last known price.
    ///
    /// The walk is bounded within `±max_walk` of `last_price`; the
    /// result never drops below one cent.
    pub fn generate(
        &self,
        symbol: &Symbol,
        last_price: Decimal,
        cycle: u64,
        now: DateTime<Utc>,
    ) -> Quote {
        let mut rng = StdRng::seed_from_u64(seed_for(symbol, cycle));

        let walk_pct: f64 = rng.gen_range(-self.max_walk..=self.max_walk);
        let walk = Decimal::from_f64(walk_pct).unwrap_or(Decimal::ZERO);

        let price = (last_price * (Decimal::ONE + walk))
            .round_dp(2)
            .max(dec!(0.01));

        // Simulated 24h change, bounded the same way as the walk.
        let change_pct: f64 = rng.gen_range(-self.max_walk..=self.max_walk);
        let change = (last_price
            * Decimal::from_f64(change_pct).unwrap_or(Decimal::ZERO))
        .round_dp(2);

        Quote {
            symbol: symbol.clone(),
            price,
            change_24h: change,
            volume_24h: None,
            market_cap: None,
            observed_at: now,
            source: SYNTHETIC_SOURCE.to_string(),
        }
    }
}

impl Default for SyntheticGenerator {
    fn default() -> Self {
        Self::new(0.05)
    }
}

fn seed_for(symbol: &str, cycle: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    symbol.hash(&mut hasher);
    cycle.hash(&mut hasher);
    hasher.finish()
}

//! Core price-feed domain types.
//!
//! Defines the entities the engine reconciles: quotes observed from
//! providers, canonical per-symbol feeds, append-only history points,
//! and daily movement statistics. These types are the foundation of
//! the hexagonal architecture's inner ring.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lightweight asset identifier used throughout the engine (e.g. `BTC`, `XAU`).
///
/// Always uppercase; unique key across the feed store.
pub type Symbol = String;

/// Scope key for the aggregated (all-symbol) movement statistics row.
pub const GLOBAL_SCOPE: &str = "global";

/// Asset classes the engine polls, each with its own provider chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    /// Cryptocurrencies (BTC, ETH, ...).
    Crypto,
    /// Precious metals (XAU, XAG, XPT, ...).
    Metal,
    /// Real-estate index assets.
    RealEstate,
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Crypto => write!(f, "crypto"),
            Self::Metal => write!(f, "metal"),
            Self::RealEstate => write!(f, "real_estate"),
        }
    }
}

/// Classified price change between two reconciliations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Movement {
    Increase,
    Decrease,
    Unchanged,
}

impl std::fmt::Display for Movement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Increase => write!(f, "increase"),
            Self::Decrease => write!(f, "decrease"),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// One provider's point-in-time price observation for a symbol.
///
/// Immutable once created; produced by a quote source or the synthetic
/// generator and consumed by the feed store's reconcile step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    /// Asset identifier.
    pub symbol: Symbol,
    /// Observed price in USD; always positive.
    pub price: Decimal,
    /// Provider-reported 24h change (may be negative).
    pub change_24h: Decimal,
    /// 24h traded volume, if the provider reports it.
    pub volume_24h: Option<Decimal>,
    /// Market capitalization, if the provider reports it.
    pub market_cap: Option<Decimal>,
    /// When the observation was made.
    pub observed_at: DateTime<Utc>,
    /// Name of the source that produced this quote.
    pub source: String,
}

/// Canonical current-price record for a symbol.
///
/// Exactly one per symbol; mutated only by the feed store's reconcile
/// step. `current_price` is never reset on upstream failure — readers
/// always see the last value the engine could establish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    /// Asset identifier.
    pub symbol: Symbol,
    /// Human-readable name (e.g. "Bitcoin", "Gold (1 oz)").
    pub display_name: String,
    /// Asset class this feed belongs to.
    pub asset_class: AssetClass,
    /// Most recent reconciled price.
    pub current_price: Decimal,
    /// Delta against the previous reconciled price.
    pub change_24h: Decimal,
    /// Percentage change, clamped to the fixed-precision bounds.
    pub change_pct_24h: Decimal,
    /// 24h traded volume from the latest quote.
    pub volume_24h: Option<Decimal>,
    /// Market cap from the latest quote.
    pub market_cap: Option<Decimal>,
    /// False once the symbol leaves the registry.
    pub is_active: bool,
    /// Timestamp of the last accepted reconciliation.
    pub last_updated: DateTime<Utc>,
}

impl Feed {
    /// Create a feed from the first quote seen for a symbol.
    ///
    /// Seeds `current_price` from the quote with zero change; the first
    /// reconciliation writes no history point.
    pub fn seeded(
        quote: &Quote,
        display_name: String,
        asset_class: AssetClass,
    ) -> Self {
        Self {
            symbol: quote.symbol.clone(),
            display_name,
            asset_class,
            current_price: quote.price,
            change_24h: Decimal::ZERO,
            change_pct_24h: Decimal::ZERO,
            volume_24h: quote.volume_24h,
            market_cap: quote.market_cap,
            is_active: true,
            last_updated: quote.observed_at,
        }
    }
}

/// One append-only history record per accepted reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// Asset identifier.
    pub symbol: Symbol,
    /// Reconciled price.
    pub price: Decimal,
    /// Delta against the previous price.
    pub change_amount: Decimal,
    /// Clamped percentage change.
    pub change_pct: Decimal,
    /// Classified movement direction.
    pub movement: Movement,
    /// When the reconciliation happened.
    pub observed_at: DateTime<Utc>,
}

/// Daily movement counters and 24h window extremes for one scope.
///
/// Scope is either a symbol or [`GLOBAL_SCOPE`]. Counters only increase
/// while `date` is "today" (UTC); rows for prior dates are immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementStats {
    /// Symbol, or `"global"` for the all-symbol aggregate.
    pub scope: String,
    /// UTC calendar day the counters belong to.
    pub date: NaiveDate,
    /// Upward movements recorded today.
    pub increases: u64,
    /// Downward movements recorded today.
    pub decreases: u64,
    /// Same-price observations recorded today.
    pub unchanged: u64,
    /// Highest price seen in the trailing 24h window.
    pub high_24h: Option<Decimal>,
    /// Lowest price seen in the trailing 24h window.
    pub low_24h: Option<Decimal>,
    /// Average price over the trailing 24h window.
    pub avg_24h: Option<Decimal>,
}

impl MovementStats {
    /// Fresh all-zero row for a scope and day.
    pub fn new(scope: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            scope: scope.into(),
            date,
            increases: 0,
            decreases: 0,
            unchanged: 0,
            high_24h: None,
            low_24h: None,
            avg_24h: None,
        }
    }

    /// Total movements recorded today.
    pub fn total(&self) -> u64 {
        self.increases + self.decreases + self.unchanged
    }

    /// Net movement today (increases minus decreases).
    pub fn net(&self) -> i64 {
        self.increases as i64 - self.decreases as i64
    }

    /// Bump the counter matching a movement kind.
    pub fn bump(&mut self, movement: Movement) {
        match movement {
            Movement::Increase => self.increases += 1,
            Movement::Decrease => self.decreases += 1,
            Movement::Unchanged => self.unchanged += 1,
        }
    }

    /// Fold a new price into the high/low extremes.
    pub fn observe_price(&mut self, price: Decimal) {
        self.high_24h = Some(self.high_24h.map_or(price, |h| h.max(price)));
        self.low_24h = Some(self.low_24h.map_or(price, |l| l.min(price)));
    }
}

/// Well-known display names for common symbols.
///
/// Falls back to the symbol itself for anything unrecognized; the
/// registry may override with its own name.
pub fn default_display_name(symbol: &str) -> &str {
    match symbol {
        "BTC" => "Bitcoin",
        "ETH" => "Ethereum",
        "ADA" => "Cardano",
        "SOL" => "Solana",
        "LINK" => "Chainlink",
        "DOT" => "Polkadot",
        "AVAX" => "Avalanche",
        "MATIC" => "Polygon",
        "XAU" => "Gold (1 oz)",
        "XAG" => "Silver (1 oz)",
        "XPT" => "Platinum (1 oz)",
        "XPD" => "Palladium (1 oz)",
        other => other,
    }
}

//! Feed Store - Canonical Current-Price Reconciliation
//!
//! The one piece of truly shared mutable state in the engine: the
//! symbol -> feed map. Single-writer-per-symbol is guaranteed by the
//! scheduler (cycles never overlap); the internal `RwLock` gives
//! multiple-reader-anytime semantics to the query facade and the
//! snapshot task.
//!
//! Reconciliation contract (per symbol):
//! - absent feed: create, seed price, no history point, no movement
//! - equal price: no effects at all
//! - changed price: compute delta/pct, clamp, classify, rewrite feed
//!
//! The feed write happens-before the derived history append and
//! movement increment; both are driven off the returned result.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::domain::feed::{AssetClass, Feed, Quote, Symbol};
use crate::domain::reconcile::{change_pct, classify, ReconcileResult};
use crate::ports::registry::TrackedSymbol;

/// In-memory canonical feed map with reconcile semantics.
pub struct FeedStore {
  feeds: RwLock<HashMap<Symbol, Feed>>,
}

impl FeedStore {
  /// Create an empty store.
  pub fn new() -> Self {
    Self {
      feeds: RwLock::new(HashMap::new()),
    }
  }

  /// Reconcile one quote against the stored feed.
  ///
  /// Creates the feed on first sight of a symbol; otherwise compares
  /// prices and rewrites the feed fields atomically under the write
  /// lock. A quote whose price equals the stored price has no effect.
  pub async fn reconcile(
    &self,
    quote: &Quote,
    display_name: &str,
    asset_class: AssetClass,
    now: DateTime<Utc>,
  ) -> ReconcileResult {
    let mut feeds = self.feeds.write().await;

    let feed = match feeds.entry(quote.symbol.clone()) {
      Entry::Vacant(slot) => {
        let mut seeded =
          Feed::seeded(quote, display_name.to_string(), asset_class);
        seeded.last_updated = now;
        info!(symbol = %quote.symbol, price = %quote.price, "Created new feed");
        slot.insert(seeded);
        return ReconcileResult::Created;
      }
      Entry::Occupied(slot) => slot.into_mut(),
    };

    if quote.price == feed.current_price {
      debug!(symbol = %quote.symbol, price = %quote.price, "Price unchanged");
      return ReconcileResult::Unchanged;
    }

    let delta = quote.price - feed.current_price;
    let pct = change_pct(delta, feed.current_price);
    let movement = classify(delta);

    feed.current_price = quote.price;
    feed.change_24h = delta;
    feed.change_pct_24h = pct;
    feed.volume_24h = quote.volume_24h;
    feed.market_cap = quote.market_cap;
    feed.last_updated = now;

    debug!(
      symbol = %quote.symbol,
      price = %quote.price,
      delta = %delta,
      pct = %pct,
      source = %quote.source,
      "Feed updated"
    );

    ReconcileResult::Updated {
      delta,
      pct,
      movement,
    }
  }

  /// Current feed for a symbol, if one exists.
  pub async fn get_feed(&self, symbol: &str) -> Option<Feed> {
    let feeds = self.feeds.read().await;
    feeds.get(symbol).cloned()
  }

  /// All feeds, sorted by symbol. `active_only` filters out feeds
  /// whose symbol has left the registry.
  pub async fn list_feeds(&self, active_only: bool) -> Vec<Feed> {
    let feeds = self.feeds.read().await;
    let mut out: Vec<Feed> = feeds
      .values()
      .filter(|f| !active_only || f.is_active)
      .cloned()
      .collect();
    out.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    out
  }

  /// Read-only view of last known prices, for the synthetic fallback.
  pub async fn last_known_prices(&self) -> HashMap<Symbol, Decimal> {
    let feeds = self.feeds.read().await;
    feeds
      .iter()
      .map(|(s, f)| (s.clone(), f.current_price))
      .collect()
  }

  /// Align feed activity with the registry: deactivate feeds whose
  /// symbol is gone, reactivate feeds whose symbol returned. Feeds are
  /// never deleted. Returns the number of flips.
  pub async fn sync_registry(&self, tracked: &[TrackedSymbol]) -> usize {
    let tracked_set: std::collections::HashSet<&str> =
      tracked.iter().map(|t| t.symbol.as_str()).collect();

    let mut feeds = self.feeds.write().await;
    let mut flipped = 0;

    for (symbol, feed) in feeds.iter_mut() {
      let should_be_active = tracked_set.contains(symbol.as_str());
      if feed.is_active != should_be_active {
        feed.is_active = should_be_active;
        flipped += 1;
        info!(
          symbol = %symbol,
          active = should_be_active,
          "Feed activity changed with registry"
        );
      }
    }

    flipped
  }

  /// Replace the store contents from a warm-start snapshot.
  pub async fn import(&self, snapshot: Vec<Feed>) {
    let mut feeds = self.feeds.write().await;
    feeds.clear();
    for feed in snapshot {
      feeds.insert(feed.symbol.clone(), feed);
    }
  }

  /// Export every feed (active or not) for snapshotting.
  pub async fn export(&self) -> Vec<Feed> {
    self.list_feeds(false).await
  }
}

impl Default for FeedStore {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::feed::Movement;
  use crate::domain::reconcile::MAX_CHANGE_PCT;
  use rust_decimal_macros::dec;

  fn quote(symbol: &str, price: Decimal) -> Quote {
    Quote {
      symbol: symbol.to_string(),
      price,
      change_24h: Decimal::ZERO,
      volume_24h: None,
      market_cap: None,
      observed_at: Utc::now(),
      source: "test".to_string(),
    }
  }

  #[tokio::test]
  async fn test_first_quote_creates_feed() {
    let store = FeedStore::new();
    let result = store
      .reconcile(&quote("BTC", dec!(45000)), "Bitcoin", AssetClass::Crypto, Utc::now())
      .await;
    assert_eq!(result, ReconcileResult::Created);

    let feed = store.get_feed("BTC").await.unwrap();
    assert_eq!(feed.current_price, dec!(45000));
    assert_eq!(feed.change_pct_24h, Decimal::ZERO);
  }

  #[tokio::test]
  async fn test_btc_scenario_delta_and_pct() {
    let store = FeedStore::new();
    let now = Utc::now();
    store
      .reconcile(&quote("BTC", dec!(45000.00)), "Bitcoin", AssetClass::Crypto, now)
      .await;

    let result = store
      .reconcile(&quote("BTC", dec!(46350.00)), "Bitcoin", AssetClass::Crypto, now)
      .await;

    match result {
      ReconcileResult::Updated { delta, pct, movement } => {
        assert_eq!(delta, dec!(1350.00));
        assert_eq!(pct, dec!(3.00));
        assert_eq!(movement, Movement::Increase);
      }
      other => panic!("expected Updated, got {other:?}"),
    }

    let feed = store.get_feed("BTC").await.unwrap();
    assert_eq!(feed.current_price, dec!(46350.00));
    assert_eq!(feed.change_24h, dec!(1350.00));
    assert_eq!(feed.change_pct_24h, dec!(3.00));
  }

  #[tokio::test]
  async fn test_equal_price_is_unchanged() {
    let store = FeedStore::new();
    let now = Utc::now();
    store
      .reconcile(&quote("XAU", dec!(2000.00)), "Gold (1 oz)", AssetClass::Metal, now)
      .await;

    let before = store.get_feed("XAU").await.unwrap();
    let result = store
      .reconcile(&quote("XAU", dec!(2000.00)), "Gold (1 oz)", AssetClass::Metal, Utc::now())
      .await;
    assert_eq!(result, ReconcileResult::Unchanged);

    let after = store.get_feed("XAU").await.unwrap();
    assert_eq!(after.last_updated, before.last_updated);
  }

  #[tokio::test]
  async fn test_pct_clamped_on_extreme_move() {
    let store = FeedStore::new();
    let now = Utc::now();
    store
      .reconcile(&quote("ZZZ", dec!(0.0001)), "ZZZ", AssetClass::Crypto, now)
      .await;
    store
      .reconcile(&quote("ZZZ", dec!(1000000)), "ZZZ", AssetClass::Crypto, now)
      .await;

    let feed = store.get_feed("ZZZ").await.unwrap();
    assert_eq!(feed.change_pct_24h, MAX_CHANGE_PCT);
  }

  #[tokio::test]
  async fn test_sync_registry_deactivates_and_reactivates() {
    let store = FeedStore::new();
    let now = Utc::now();
    store
      .reconcile(&quote("BTC", dec!(45000)), "Bitcoin", AssetClass::Crypto, now)
      .await;
    store
      .reconcile(&quote("ETH", dec!(2800)), "Ethereum", AssetClass::Crypto, now)
      .await;

    let only_btc = vec![TrackedSymbol {
      symbol: "BTC".to_string(),
      asset_class: AssetClass::Crypto,
      display_name: None,
    }];
    let flipped = store.sync_registry(&only_btc).await;
    assert_eq!(flipped, 1);
    assert!(!store.get_feed("ETH").await.unwrap().is_active);
    assert_eq!(store.list_feeds(true).await.len(), 1);

    // ETH returns to the registry
    let both = vec![
      TrackedSymbol {
        symbol: "BTC".to_string(),
        asset_class: AssetClass::Crypto,
        display_name: None,
      },
      TrackedSymbol {
        symbol: "ETH".to_string(),
        asset_class: AssetClass::Crypto,
        display_name: None,
      },
    ];
    store.sync_registry(&both).await;
    assert!(store.get_feed("ETH").await.unwrap().is_active);
  }

  #[tokio::test]
  async fn test_import_export_round_trip() {
    let store = FeedStore::new();
    let now = Utc::now();
    store
      .reconcile(&quote("BTC", dec!(45000)), "Bitcoin", AssetClass::Crypto, now)
      .await;

    let exported = store.export().await;
    let restored = FeedStore::new();
    restored.import(exported).await;
    assert_eq!(
      restored.get_feed("BTC").await.unwrap().current_price,
      dec!(45000)
    );
  }
}

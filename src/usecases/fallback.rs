//! Fallback Chain - Ordered Provider Attempts with Synthetic Floor
//!
//! Tries each quote source for an asset class in turn, carrying the
//! still-unsatisfied symbol set forward. Typed source failures are
//! logged and recovered locally — nothing propagates to the caller.
//! After real sources are exhausted, the synthetic generator walks
//! from the last known price so the feed store always has a value to
//! reconcile against; total provider outage degrades gracefully
//! instead of freezing downstream consumers.
//!
//! Client-side rate limiting: each source carries a `governor` direct
//! limiter enforcing the provider's minimum call interval. A source
//! whose interval has not elapsed is skipped (not the whole cycle) and
//! the chain falls through to the next source.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::domain::feed::{AssetClass, Quote, Symbol};
use crate::domain::synthetic::SyntheticGenerator;
use crate::ports::quote_source::{QuoteSource, SourceError};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// One rung of the chain: a source plus its call-interval limiter.
struct ChainSource {
  source: Arc<dyn QuoteSource>,
  limiter: Option<DirectLimiter>,
}

/// Ordered fallback chain for a single asset class.
pub struct FallbackChain {
  asset_class: AssetClass,
  sources: Vec<ChainSource>,
  timeout: Duration,
  synthetic: Option<SyntheticGenerator>,
}

impl FallbackChain {
  /// Create an empty chain with the default synthetic floor.
  pub fn new(asset_class: AssetClass, timeout: Duration) -> Self {
    Self {
      asset_class,
      sources: Vec::new(),
      timeout,
      synthetic: Some(SyntheticGenerator::default()),
    }
  }

  /// Replace (or remove) the synthetic floor.
  pub fn with_synthetic(mut self, synthetic: Option<SyntheticGenerator>) -> Self {
    self.synthetic = synthetic;
    self
  }

  /// Append a source to the chain. `min_interval` of zero disables
  /// client-side limiting for this source.
  pub fn push_source(
    &mut self,
    source: Arc<dyn QuoteSource>,
    min_interval: Duration,
  ) {
    let limiter = Quota::with_period(min_interval)
      .map(RateLimiter::direct);
    self.sources.push(ChainSource { source, limiter });
  }

  /// Asset class this chain serves.
  pub fn asset_class(&self) -> AssetClass {
    self.asset_class
  }

  /// Fetch quotes for every requested symbol.
  ///
  /// Never errors; symbols no real source could satisfy are filled by
  /// the synthetic generator when a last known price exists. A symbol
  /// with neither a quote nor a last known price is omitted — the
  /// caller's stale feed stays untouched.
  pub async fn fetch(
    &self,
    symbols: &[Symbol],
    last_known: &HashMap<Symbol, Decimal>,
    cycle: u64,
    now: DateTime<Utc>,
  ) -> HashMap<Symbol, Quote> {
    let mut remaining: Vec<Symbol> = symbols.to_vec();
    let mut satisfied: HashMap<Symbol, Quote> = HashMap::new();

    for rung in &self.sources {
      if remaining.is_empty() {
        break;
      }

      if let Some(limiter) = &rung.limiter {
        if limiter.check().is_err() {
          debug!(
            source = rung.source.name(),
            class = %self.asset_class,
            "Skipping source, minimum call interval not elapsed"
          );
          continue;
        }
      }

      let attempt = tokio::time::timeout(
        self.timeout,
        rung.source.fetch(&remaining),
      )
      .await;

      let outcome = match attempt {
        Err(_elapsed) => Err(SourceError::Timeout),
        Ok(result) => result,
      };

      match outcome {
        Ok(quotes) => {
          let got = quotes.len();
          for (symbol, quote) in quotes {
            if quote.price <= Decimal::ZERO {
              warn!(
                source = rung.source.name(),
                symbol = %symbol,
                price = %quote.price,
                "Discarding non-positive quote"
              );
              continue;
            }
            if let Some(pos) = remaining.iter().position(|s| *s == symbol) {
              remaining.swap_remove(pos);
              satisfied.insert(symbol, quote);
            }
          }
          debug!(
            source = rung.source.name(),
            class = %self.asset_class,
            quotes = got,
            unsatisfied = remaining.len(),
            "Source attempt succeeded"
          );
        }
        Err(error) => {
          warn!(
            source = rung.source.name(),
            class = %self.asset_class,
            error = %error,
            unsatisfied = remaining.len(),
            "Source attempt failed, advancing to next source"
          );
        }
      }
    }

    if !remaining.is_empty() {
      if let Some(synthetic) = &self.synthetic {
        let mut generated = 0;
        for symbol in &remaining {
          let Some(last_price) = last_known.get(symbol).copied() else {
            warn!(
              symbol = %symbol,
              class = %self.asset_class,
              "No last known price for synthetic fallback, leaving feed stale"
            );
            continue;
          };
          satisfied.insert(
            symbol.clone(),
            synthetic.generate(symbol, last_price, cycle, now),
          );
          generated += 1;
        }
        info!(
          class = %self.asset_class,
          synthetic = generated,
          "Real sources exhausted, synthetic fallback engaged"
        );
      } else {
        warn!(
          class = %self.asset_class,
          unsatisfied = remaining.len(),
          "All sources exhausted and no synthetic fallback configured"
        );
      }
    }

    satisfied
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use rust_decimal_macros::dec;
  use std::sync::atomic::{AtomicU32, Ordering};

  struct StaticSource {
    name: String,
    quotes: HashMap<Symbol, Decimal>,
    calls: AtomicU32,
  }

  impl StaticSource {
    fn new(name: &str, quotes: &[(&str, Decimal)]) -> Self {
      Self {
        name: name.to_string(),
        quotes: quotes
          .iter()
          .map(|(s, p)| (s.to_string(), *p))
          .collect(),
        calls: AtomicU32::new(0),
      }
    }
  }

  #[async_trait]
  impl QuoteSource for StaticSource {
    fn name(&self) -> &str {
      &self.name
    }

    fn asset_class(&self) -> AssetClass {
      AssetClass::Crypto
    }

    async fn fetch(
      &self,
      symbols: &[Symbol],
    ) -> crate::ports::quote_source::SourceResult {
      self.calls.fetch_add(1, Ordering::Relaxed);
      Ok(
        symbols
          .iter()
          .filter_map(|s| {
            self.quotes.get(s).map(|p| {
              (
                s.clone(),
                Quote {
                  symbol: s.clone(),
                  price: *p,
                  change_24h: Decimal::ZERO,
                  volume_24h: None,
                  market_cap: None,
                  observed_at: Utc::now(),
                  source: self.name.clone(),
                },
              )
            })
          })
          .collect(),
      )
    }
  }

  struct FailingSource;

  #[async_trait]
  impl QuoteSource for FailingSource {
    fn name(&self) -> &str {
      "failing"
    }

    fn asset_class(&self) -> AssetClass {
      AssetClass::Crypto
    }

    async fn fetch(
      &self,
      _symbols: &[Symbol],
    ) -> crate::ports::quote_source::SourceResult {
      Err(SourceError::Unavailable { status: 503 })
    }
  }

  fn symbols(names: &[&str]) -> Vec<Symbol> {
    names.iter().map(|s| s.to_string()).collect()
  }

  #[tokio::test]
  async fn test_primary_satisfies_fallback_fills_rest() {
    let mut chain =
      FallbackChain::new(AssetClass::Crypto, Duration::from_secs(1));
    chain.push_source(
      Arc::new(StaticSource::new(
        "primary",
        &[("BTC", dec!(45000)), ("ETH", dec!(2800))],
      )),
      Duration::ZERO,
    );
    chain.push_source(
      Arc::new(StaticSource::new("secondary", &[])),
      Duration::ZERO,
    );

    let last_known: HashMap<Symbol, Decimal> =
      [("ZZZ".to_string(), dec!(100))].into_iter().collect();

    let result = chain
      .fetch(&symbols(&["BTC", "ETH", "ZZZ"]), &last_known, 1, Utc::now())
      .await;

    assert_eq!(result.len(), 3);
    assert_eq!(result["BTC"].price, dec!(45000));
    assert_eq!(result["BTC"].source, "primary");

    // ZZZ came from the synthetic floor, bounded within ±5%
    let zzz = &result["ZZZ"];
    assert_eq!(zzz.source, crate::domain::synthetic::SYNTHETIC_SOURCE);
    assert!(zzz.price >= dec!(95) && zzz.price <= dec!(105));
  }

  #[tokio::test]
  async fn test_all_sources_failing_still_covers_known_symbols() {
    let mut chain =
      FallbackChain::new(AssetClass::Crypto, Duration::from_secs(1));
    chain.push_source(Arc::new(FailingSource), Duration::ZERO);
    chain.push_source(Arc::new(FailingSource), Duration::ZERO);

    let last_known: HashMap<Symbol, Decimal> = [
      ("BTC".to_string(), dec!(45000)),
      ("ETH".to_string(), dec!(2800)),
    ]
    .into_iter()
    .collect();

    let result = chain
      .fetch(&symbols(&["BTC", "ETH"]), &last_known, 1, Utc::now())
      .await;
    assert_eq!(result.len(), 2);
  }

  #[tokio::test]
  async fn test_unknown_symbol_without_synthetic_base_is_omitted() {
    let mut chain =
      FallbackChain::new(AssetClass::Crypto, Duration::from_secs(1));
    chain.push_source(Arc::new(FailingSource), Duration::ZERO);

    let result = chain
      .fetch(&symbols(&["NEW"]), &HashMap::new(), 1, Utc::now())
      .await;
    assert!(result.is_empty());
  }

  #[tokio::test]
  async fn test_no_synthetic_configured_leaves_symbols_unsatisfied() {
    let mut chain = FallbackChain::new(AssetClass::Crypto, Duration::from_secs(1))
      .with_synthetic(None);
    chain.push_source(Arc::new(FailingSource), Duration::ZERO);

    let last_known: HashMap<Symbol, Decimal> =
      [("BTC".to_string(), dec!(45000))].into_iter().collect();

    let result = chain.fetch(&symbols(&["BTC"]), &last_known, 1, Utc::now()).await;
    assert!(result.is_empty());
  }

  #[tokio::test]
  async fn test_rate_limited_source_skipped_not_cycle() {
    let primary = Arc::new(StaticSource::new("primary", &[("BTC", dec!(45000))]));
    let backup = Arc::new(StaticSource::new("backup", &[("BTC", dec!(44990))]));

    let mut chain =
      FallbackChain::new(AssetClass::Crypto, Duration::from_secs(1));
    // A one-hour interval: the second fetch within the test must skip it.
    chain.push_source(primary.clone(), Duration::from_secs(3600));
    chain.push_source(backup.clone(), Duration::ZERO);

    let wanted = symbols(&["BTC"]);
    let first = chain.fetch(&wanted, &HashMap::new(), 1, Utc::now()).await;
    assert_eq!(first["BTC"].source, "primary");

    let second = chain.fetch(&wanted, &HashMap::new(), 2, Utc::now()).await;
    assert_eq!(second["BTC"].source, "backup");
    assert_eq!(primary.calls.load(Ordering::Relaxed), 1);
  }
}

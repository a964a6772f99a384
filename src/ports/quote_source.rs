//! Quote Source Port - External Price Provider Interface
//!
//! Defines the trait for batch price providers and the typed failure
//! taxonomy the fallback chain matches on. A failed attempt is data,
//! not control flow: the chain inspects the variant, logs it, and
//! advances to the next source.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::feed::{AssetClass, Quote, Symbol};

/// Typed failure from a single provider attempt.
///
/// Every variant is recovered locally by the fallback chain; none of
/// them propagate past it.
#[derive(Debug, Error)]
pub enum SourceError {
  /// The request exceeded the per-call deadline.
  #[error("provider timed out")]
  Timeout,
  /// The provider (or our client-side limiter) refused the call.
  #[error("provider rate limited")]
  RateLimited,
  /// Non-2xx response or connection failure.
  #[error("provider unavailable (status {status})")]
  Unavailable { status: u16 },
  /// 2xx response whose payload could not be interpreted.
  #[error("malformed provider payload: {0}")]
  Malformed(String),
}

/// Result of one batch attempt: quotes keyed by symbol.
pub type SourceResult = Result<HashMap<Symbol, Quote>, SourceError>;

/// Trait for external price providers.
///
/// Implementors fetch a batch of symbols in one upstream call (one
/// call per asset class per cycle, to respect provider rate limits).
/// A source that cannot satisfy some of the requested symbols simply
/// omits them from the returned map; that is not an error.
#[async_trait]
pub trait QuoteSource: Send + Sync + 'static {
  /// Stable provider name, used for logging and rate-limit tracking.
  fn name(&self) -> &str;

  /// Asset class this source serves.
  fn asset_class(&self) -> AssetClass;

  /// Fetch quotes for the given symbols in one batch call.
  async fn fetch(&self, symbols: &[Symbol]) -> SourceResult;
}

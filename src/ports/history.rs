//! History Store Port - Append-only Price History Interface
//!
//! History is best-effort observability, not a source of truth: an
//! append failure must never roll back or block the feed write that
//! produced it. The caller logs the error and moves on.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::feed::HistoryPoint;

/// Trait for the append-only per-symbol price time series.
#[async_trait]
pub trait HistoryStore: Send + Sync + 'static {
  /// Append one history point. Fire-and-forget from the pipeline's
  /// perspective; the scheduler logs failures at warn and continues.
  async fn append(&self, point: &HistoryPoint) -> anyhow::Result<()>;

  /// Points for a symbol within `[since, until]`, ascending by time.
  async fn range(
    &self,
    symbol: &str,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
  ) -> anyhow::Result<Vec<HistoryPoint>>;

  /// Drop whole days older than `cutoff`. Housekeeping, not hot path;
  /// returns the number of days removed.
  async fn prune_before(&self, cutoff: NaiveDate) -> anyhow::Result<u64>;
}

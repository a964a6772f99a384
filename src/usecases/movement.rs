//! Movement Aggregator - Daily Increase/Decrease/Unchanged Counters
//!
//! Per-symbol-per-day counters plus a "global" row aggregating every
//! symbol, with 24h high/low/average window statistics. Rows are keyed
//! by (scope, UTC calendar day); a row for a prior date is never
//! mutated again — the day an event belongs to is whatever
//! `now.date_naive()` resolves to at record time, so a call landing
//! exactly on the UTC-midnight boundary counts once, on one side.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::feed::{Movement, MovementStats, GLOBAL_SCOPE};
use crate::ports::history::HistoryStore;

/// In-memory movement statistics keyed by (scope, date).
pub struct MovementAggregator {
  rows: RwLock<HashMap<(String, NaiveDate), MovementStats>>,
}

impl MovementAggregator {
  /// Create an empty aggregator.
  pub fn new() -> Self {
    Self {
      rows: RwLock::new(HashMap::new()),
    }
  }

  /// Record one classified movement for a symbol.
  ///
  /// Get-or-creates today's row for the symbol and for the global
  /// scope, increments the matching counter on both, and folds the
  /// price into the symbol row's high/low extremes.
  pub async fn record(
    &self,
    symbol: &str,
    movement: Movement,
    price: Decimal,
    now: DateTime<Utc>,
  ) {
    let today = now.date_naive();
    let mut rows = self.rows.write().await;

    let row = rows
      .entry((symbol.to_string(), today))
      .or_insert_with(|| MovementStats::new(symbol, today));
    row.bump(movement);
    row.observe_price(price);

    let global = rows
      .entry((GLOBAL_SCOPE.to_string(), today))
      .or_insert_with(|| MovementStats::new(GLOBAL_SCOPE, today));
    global.bump(movement);

    debug!(symbol, %movement, %price, date = %today, "Movement recorded");
  }

  /// Stats row for a scope and date, if one exists.
  pub async fn stats_for(
    &self,
    scope: &str,
    date: NaiveDate,
  ) -> Option<MovementStats> {
    let rows = self.rows.read().await;
    rows.get(&(scope.to_string(), date)).cloned()
  }

  /// Today's global row; an all-zero row when nothing moved yet.
  pub async fn today_global(&self, now: DateTime<Utc>) -> MovementStats {
    let today = now.date_naive();
    self
      .stats_for(GLOBAL_SCOPE, today)
      .await
      .unwrap_or_else(|| MovementStats::new(GLOBAL_SCOPE, today))
  }

  /// Recompute the trailing-24h high/low/average for a symbol from the
  /// history log. Called once per cycle for symbols that moved, not on
  /// every event, to bound cost.
  pub async fn refresh_window<H: HistoryStore + ?Sized>(
    &self,
    symbol: &str,
    history: &H,
    now: DateTime<Utc>,
  ) -> Result<()> {
    let points = history
      .range(symbol, now - Duration::hours(24), now)
      .await?;
    if points.is_empty() {
      return Ok(());
    }

    let mut high = points[0].price;
    let mut low = points[0].price;
    let mut sum = Decimal::ZERO;
    for point in &points {
      high = high.max(point.price);
      low = low.min(point.price);
      sum += point.price;
    }
    let avg = (sum / Decimal::from(points.len() as u64)).round_dp(2);

    let today = now.date_naive();
    let mut rows = self.rows.write().await;
    let row = rows
      .entry((symbol.to_string(), today))
      .or_insert_with(|| MovementStats::new(symbol, today));
    row.high_24h = Some(high);
    row.low_24h = Some(low);
    row.avg_24h = Some(avg);

    Ok(())
  }
}

impl Default for MovementAggregator {
  fn default() -> Self {
    Self::new()
  }
}

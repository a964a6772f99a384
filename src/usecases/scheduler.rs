//! Scheduler - The Fetch-Reconcile-Broadcast Cycle Loop
//!
//! The single writer into the feed store. Each cycle polls the
//! registry, runs one batch fetch per asset class through the fallback
//! chains, reconciles every returned quote, appends history and
//! movement records for accepted updates, and publishes a full
//! snapshot to the broadcast sink.
//!
//! State machine: Idle -> Fetching -> Reconciling -> Broadcasting ->
//! Idle, looping until a shutdown signal is observed; terminal state
//! Stopped. The in-flight cycle always finishes (bounded by per-call
//! timeouts) before the loop exits.
//!
//! Failure semantics: a cycle-level error (registry unreachable) is
//! logged at error severity and the scheduler sleeps a short retry
//! delay before the next cycle. Nothing here ever terminates the
//! process; an external watchdog owns restarts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, instrument, warn};

use crate::adapters::metrics::EngineMetrics;
use crate::config::SchedulerConfig;
use crate::domain::feed::{
  default_display_name, AssetClass, HistoryPoint, Symbol,
};
use crate::domain::reconcile::ReconcileResult;
use crate::domain::synthetic::SYNTHETIC_SOURCE;
use crate::ports::broadcast::{BroadcastSink, FeedSnapshot};
use crate::ports::history::HistoryStore;
use crate::ports::registry::SymbolRegistry;
use crate::usecases::fallback::FallbackChain;
use crate::usecases::feed_store::FeedStore;
use crate::usecases::movement::MovementAggregator;

/// Observable scheduler state for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
  Idle,
  Fetching,
  Reconciling,
  Broadcasting,
  Stopped,
}

/// Outcome counts for one completed cycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleSummary {
  /// Feeds created for previously-unseen symbols.
  pub created: usize,
  /// Feeds whose price changed.
  pub updated: usize,
  /// Quotes matching the stored price exactly.
  pub unchanged: usize,
  /// Quotes filled in by the synthetic generator.
  pub synthetic: usize,
}

/// The periodic ingestion worker.
pub struct Scheduler<R, H, B>
where
  R: SymbolRegistry,
  H: HistoryStore,
  B: BroadcastSink,
{
  registry: Arc<R>,
  chains: Vec<FallbackChain>,
  store: Arc<FeedStore>,
  movements: Arc<MovementAggregator>,
  history: Arc<H>,
  sink: Arc<B>,
  metrics: Arc<EngineMetrics>,
  config: SchedulerConfig,
  /// Base prices for synthetic quotes on never-before-seen symbols.
  synthetic_bases: HashMap<Symbol, Decimal>,
  state_tx: watch::Sender<CycleState>,
  cycle: u64,
  shutdown_rx: broadcast::Receiver<()>,
}

impl<R, H, B> Scheduler<R, H, B>
where
  R: SymbolRegistry,
  H: HistoryStore,
  B: BroadcastSink,
{
  /// Create a scheduler over the given chains and collaborators.
  #[allow(clippy::too_many_arguments)]
  pub fn new(
    registry: Arc<R>,
    chains: Vec<FallbackChain>,
    store: Arc<FeedStore>,
    movements: Arc<MovementAggregator>,
    history: Arc<H>,
    sink: Arc<B>,
    metrics: Arc<EngineMetrics>,
    config: SchedulerConfig,
    synthetic_bases: HashMap<Symbol, Decimal>,
    shutdown_rx: broadcast::Receiver<()>,
  ) -> Self {
    let (state_tx, _) = watch::channel(CycleState::Idle);
    Self {
      registry,
      chains,
      store,
      movements,
      history,
      sink,
      metrics,
      config,
      synthetic_bases,
      state_tx,
      cycle: 0,
      shutdown_rx,
    }
  }

  /// Subscribe to scheduler state transitions.
  pub fn state_receiver(&self) -> watch::Receiver<CycleState> {
    self.state_tx.subscribe()
  }

  /// Run cycles until shutdown. The first cycle starts immediately;
  /// subsequent cycles are separated by the configured interval, or by
  /// the retry delay after a failed cycle.
  #[instrument(skip(self), name = "scheduler_loop")]
  pub async fn run(&mut self) -> Result<()> {
    info!(
      interval_s = self.config.interval_seconds,
      chains = self.chains.len(),
      "Scheduler started"
    );

    loop {
      let delay = match self.run_cycle().await {
        Ok(summary) => {
          info!(
            cycle = self.cycle,
            created = summary.created,
            updated = summary.updated,
            unchanged = summary.unchanged,
            synthetic = summary.synthetic,
            "Cycle completed"
          );
          Duration::from_secs(self.config.interval_seconds)
        }
        Err(e) => {
          error!(error = %e, cycle = self.cycle, "Cycle failed, will retry");
          self.metrics.cycle_errors.inc();
          Duration::from_secs(self.config.retry_delay_seconds)
        }
      };

      tokio::select! {
        biased;
        _ = self.shutdown_rx.recv() => {
          info!("Shutdown signal received, scheduler stopping");
          break;
        }
        () = tokio::time::sleep(delay) => {}
      }
    }

    let _ = self.state_tx.send(CycleState::Stopped);
    info!(cycles = self.cycle, "Scheduler stopped cleanly");
    Ok(())
  }

  /// Run exactly one fetch-reconcile-broadcast cycle.
  pub async fn run_cycle(&mut self) -> Result<CycleSummary> {
    let now = Utc::now();
    let _ = self.state_tx.send(CycleState::Fetching);

    let tracked = self
      .registry
      .tracked_symbols()
      .await
      .context("Registry provider unreachable")?;

    if tracked.is_empty() {
      warn!("Registry returned no tracked symbols, skipping cycle");
      let _ = self.state_tx.send(CycleState::Idle);
      return Ok(CycleSummary::default());
    }

    self.store.sync_registry(&tracked).await;

    // Per-symbol display names and one batch of symbols per class.
    let mut names: HashMap<Symbol, (String, AssetClass)> = HashMap::new();
    let mut by_class: HashMap<AssetClass, Vec<Symbol>> = HashMap::new();
    for entry in &tracked {
      let name = entry
        .display_name
        .clone()
        .unwrap_or_else(|| default_display_name(&entry.symbol).to_string());
      names.insert(entry.symbol.clone(), (name, entry.asset_class));
      by_class
        .entry(entry.asset_class)
        .or_default()
        .push(entry.symbol.clone());
    }

    // Last known prices feed the synthetic floor; configured base
    // prices cover symbols that have never been quoted.
    let mut last_known = self.store.last_known_prices().await;
    for (symbol, base) in &self.synthetic_bases {
      last_known.entry(symbol.clone()).or_insert(*base);
    }

    let mut quotes = Vec::new();
    for chain in &self.chains {
      let Some(symbols) = by_class.get(&chain.asset_class()) else {
        continue;
      };
      let fetched = chain.fetch(symbols, &last_known, self.cycle, now).await;
      quotes.extend(fetched.into_values());
    }

    let _ = self.state_tx.send(CycleState::Reconciling);

    let mut summary = CycleSummary::default();
    let mut moved: Vec<Symbol> = Vec::new();

    for quote in &quotes {
      if quote.source == SYNTHETIC_SOURCE {
        summary.synthetic += 1;
        self.metrics.synthetic_quotes.inc();
      }

      let Some((name, class)) = names.get(&quote.symbol) else {
        // Chains only return requested symbols; a miss here would be
        // a bug in a source adapter.
        warn!(symbol = %quote.symbol, "Quote for untracked symbol dropped");
        continue;
      };

      match self.store.reconcile(quote, name, *class, now).await {
        ReconcileResult::Created => {
          summary.created += 1;
          self.metrics.feeds_created.inc();
        }
        ReconcileResult::Unchanged => {
          summary.unchanged += 1;
          self.metrics.quotes_unchanged.inc();
        }
        ReconcileResult::Updated {
          delta,
          pct,
          movement,
        } => {
          summary.updated += 1;
          self.metrics.feeds_updated.inc();

          let point = HistoryPoint {
            symbol: quote.symbol.clone(),
            price: quote.price,
            change_amount: delta,
            change_pct: pct,
            movement,
            observed_at: now,
          };
          if let Err(e) = self.history.append(&point).await {
            warn!(
              symbol = %quote.symbol,
              error = %e,
              "History append failed, feed write stands"
            );
            self.metrics.history_write_failures.inc();
          }

          self
            .movements
            .record(&quote.symbol, movement, quote.price, now)
            .await;
          moved.push(quote.symbol.clone());
        }
      }
    }

    // Periodic 24h window refresh, bounded to the symbols that moved.
    for symbol in &moved {
      if let Err(e) = self
        .movements
        .refresh_window(symbol, self.history.as_ref(), now)
        .await
      {
        warn!(symbol = %symbol, error = %e, "Window stats refresh failed");
      }
    }

    let _ = self.state_tx.send(CycleState::Broadcasting);

    let feeds = self.store.list_feeds(true).await;
    self.metrics.active_feeds.set(feeds.len() as i64);

    let snapshot = FeedSnapshot {
      feeds,
      movement: self.movements.today_global(now).await,
      cycle: self.cycle,
      published_at: now,
    };
    self.sink.publish(&snapshot).await;

    self.metrics.cycles_completed.inc();
    self
      .metrics
      .last_cycle_timestamp
      .set(now.timestamp() as f64);

    let _ = self.state_tx.send(CycleState::Idle);
    self.cycle += 1;

    Ok(summary)
  }
}

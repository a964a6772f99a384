//! Price Feed Engine — Entry Point
//!
//! Initializes configuration, logging, provider chains, and the
//! scheduler loop. Runs until SIGINT/SIGTERM.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Create shutdown/readiness channels
//! 4. Warm-start the feed store from the last snapshot
//! 5. Build per-class fallback chains over the HTTP sources
//! 6. Spawn the API server (query facade + /live + /ready + /metrics)
//! 7. Spawn the maintenance task (periodic snapshots, daily pruning)
//! 8. Spawn the scheduler (fetch-reconcile-broadcast loop)
//! 9. Wait for SIGINT → graceful shutdown (finish cycle→snapshot→exit)

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::signal;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

mod adapters;
mod config;
mod domain;
mod ports;
mod usecases;

use adapters::api::{self, ApiState};
use adapters::broadcast::ChannelBroadcaster;
use adapters::metrics::EngineMetrics;
use adapters::persistence::{FeedSnapshotStore, JsonlHistoryStore};
use adapters::registry::ConfigRegistry;
use adapters::sources::{
    CoinGeckoSource, CoinPaprikaSource, MetalsApiSource, YahooMetalsSource,
};
use domain::feed::{AssetClass, Symbol};
use domain::synthetic::SyntheticGenerator;
use ports::history::HistoryStore;
use usecases::fallback::FallbackChain;
use usecases::feed_store::FeedStore;
use usecases::movement::MovementAggregator;
use usecases::scheduler::{CycleState, Scheduler};

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration from config.toml ──────────────
    let config = config::loader::load_config(CONFIG_PATH)
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(&config.engine.log_level)
                }),
        )
        .json()
        .init();

    info!(
        name = %config.engine.name,
        version = env!("CARGO_PKG_VERSION"),
        symbols = config.symbols.len(),
        interval_s = config.scheduler.interval_seconds,
        "Starting price feed engine"
    );

    // ── 3. Shutdown and readiness channels ──────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let (ready_tx, ready_rx) = watch::channel(true);

    // ── 4. Stores: feeds (warm-started), history, movements ─
    let snapshot_store = Arc::new(
        FeedSnapshotStore::new(&config.persistence.data_dir)
            .await
            .context("Failed to create snapshot store")?,
    );

    let store = Arc::new(FeedStore::new());
    match snapshot_store.load().await {
        Ok(Some(feeds)) => {
            info!(feeds = feeds.len(), "Warm-starting from feed snapshot");
            store.import(feeds).await;
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Snapshot load failed, starting fresh"),
    }

    let history = Arc::new(
        JsonlHistoryStore::new(&config.persistence.data_dir)
            .await
            .context("Failed to create history store")?,
    );
    let movements = Arc::new(MovementAggregator::new());
    let metrics = Arc::new(EngineMetrics::new().context("Failed to register metrics")?);

    // ── 5. Fallback chains over the HTTP sources ────────────
    let chains = build_chains(&config)?;

    // ── 6. Registry and broadcast sink ──────────────────────
    let registry = Arc::new(ConfigRegistry::new(CONFIG_PATH, &config.symbols));
    let sink = Arc::new(ChannelBroadcaster::default());

    // ── 7. Spawn API server ─────────────────────────────────
    let api_state = ApiState {
        store: Arc::clone(&store),
        movements: Arc::clone(&movements),
        history: Arc::clone(&history) as Arc<dyn HistoryStore>,
        metrics: Arc::clone(&metrics),
        ready: ready_rx,
        metrics_enabled: config.api.metrics_enabled,
    };
    let bind_address = config.api.bind_address.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, &bind_address).await {
            error!(error = %e, "API server failed");
        }
    });

    // ── 8. Spawn maintenance (snapshots + history pruning) ──
    let maintenance_handle = tokio::spawn(run_maintenance(
        Arc::clone(&store),
        Arc::clone(&snapshot_store),
        Arc::clone(&history),
        config.persistence.clone(),
        shutdown_tx.subscribe(),
    ));

    // ── 9. Spawn the scheduler ──────────────────────────────
    let synthetic_bases: HashMap<Symbol, Decimal> = config
        .symbols
        .iter()
        .filter_map(|s| s.initial_price.map(|p| (s.symbol.clone(), p)))
        .collect();

    let mut scheduler = Scheduler::new(
        registry,
        chains,
        Arc::clone(&store),
        Arc::clone(&movements),
        Arc::clone(&history),
        sink,
        Arc::clone(&metrics),
        config.scheduler.clone(),
        synthetic_bases,
        shutdown_tx.subscribe(),
    );

    // Flip readiness off if the scheduler ever reaches Stopped.
    let mut state_rx = scheduler.state_receiver();
    let stopped_ready_tx = ready_tx.clone();
    tokio::spawn(async move {
        while state_rx.changed().await.is_ok() {
            if *state_rx.borrow() == CycleState::Stopped {
                let _ = stopped_ready_tx.send(false);
                break;
            }
        }
    });

    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = scheduler.run().await {
            error!(error = %e, "Scheduler failed");
        }
    });

    info!("All tasks spawned — engine is running");

    // ── 10. Wait for SIGINT ─────────────────────────────────
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("SIGINT received, initiating graceful shutdown");
        }
    }

    // ── Graceful shutdown: signal → finish cycle → snapshot ──

    let _ = shutdown_tx.send(());
    info!("Shutdown signal broadcast to all tasks");

    let _ = ready_tx.send(false);

    // Let the in-flight cycle finish, bounded by the grace period.
    let grace = Duration::from_secs(config.scheduler.shutdown_grace_seconds);
    if tokio::time::timeout(grace, scheduler_handle).await.is_err() {
        warn!("Scheduler did not stop within grace period");
    }

    let _ = tokio::time::timeout(Duration::from_secs(5), maintenance_handle).await;

    // Final snapshot so the next start resumes from current prices.
    let feeds = store.export().await;
    if let Err(e) = snapshot_store.save(feeds, Utc::now()).await {
        warn!(error = %e, "Final feed snapshot failed");
    }

    api_handle.abort();

    info!("Shutdown complete");
    Ok(())
}

/// Build the per-class fallback chains from configuration.
///
/// Crypto: CoinGecko then CoinPaprika. Metals: Metals-API then the
/// Yahoo ETF proxies. Real estate has no real provider; its chain is
/// the synthetic floor alone, matching the legacy simulated feed.
fn build_chains(config: &config::AppConfig) -> Result<Vec<FallbackChain>> {
    let timeout = Duration::from_secs(config.scheduler.source_timeout_seconds);
    let synthetic = SyntheticGenerator::new(config.synthetic.max_walk_pct);

    let mut crypto = FallbackChain::new(AssetClass::Crypto, timeout)
        .with_synthetic(Some(synthetic.clone()));
    crypto.push_source(
        Arc::new(CoinGeckoSource::new(
            &config.sources.coingecko.base_url,
            timeout,
        )?),
        Duration::from_secs(config.sources.coingecko.min_interval_seconds),
    );
    crypto.push_source(
        Arc::new(CoinPaprikaSource::new(
            &config.sources.coinpaprika.base_url,
            timeout,
        )?),
        Duration::from_secs(config.sources.coinpaprika.min_interval_seconds),
    );

    let mut metal = FallbackChain::new(AssetClass::Metal, timeout)
        .with_synthetic(Some(synthetic.clone()));
    metal.push_source(
        Arc::new(MetalsApiSource::new(
            &config.sources.metals_api.base_url,
            config.sources.metals_api.access_key.as_deref().unwrap_or(""),
            timeout,
        )?),
        Duration::from_secs(config.sources.metals_api.min_interval_seconds),
    );
    metal.push_source(
        Arc::new(YahooMetalsSource::new(
            &config.sources.yahoo.base_url,
            timeout,
        )?),
        Duration::from_secs(config.sources.yahoo.min_interval_seconds),
    );

    let real_estate = FallbackChain::new(AssetClass::RealEstate, timeout)
        .with_synthetic(Some(synthetic));

    Ok(vec![crypto, metal, real_estate])
}

/// Periodic feed snapshots plus daily history pruning.
async fn run_maintenance(
    store: Arc<FeedStore>,
    snapshots: Arc<FeedSnapshotStore>,
    history: Arc<JsonlHistoryStore>,
    config: config::PersistenceConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let interval = Duration::from_secs(config.snapshot_interval_seconds);
    let mut last_prune_day = Utc::now().date_naive();

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                info!("Maintenance task shutting down");
                return;
            }
            () = tokio::time::sleep(interval) => {}
        }

        let now = Utc::now();
        let feeds = store.export().await;
        if !feeds.is_empty() {
            if let Err(e) = snapshots.save(feeds, now).await {
                warn!(error = %e, "Periodic feed snapshot failed");
            }
        }

        let today = now.date_naive();
        if today != last_prune_day {
            last_prune_day = today;
            let cutoff = today
                - chrono::Duration::days(i64::from(config.history_retention_days));
            match history.prune_before(cutoff).await {
                Ok(removed) if removed > 0 => {
                    info!(removed, "History pruning complete");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "History pruning failed"),
            }
        }
    }
}

//! Prometheus Metrics Registry - Pipeline Observability
//!
//! Registers and exposes Prometheus metrics for Grafana dashboards.
//! Covers cycle throughput, per-source failures, synthetic fallback
//! engagement, and broadcast delivery.

use prometheus::{
    Encoder, Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Centralized Prometheus metrics for the price-feed engine.
///
/// All metrics follow the naming convention `pricefeed_engine_*`.
pub struct EngineMetrics {
    /// Prometheus registry.
    registry: Registry,
    /// Completed fetch-reconcile-broadcast cycles.
    pub cycles_completed: IntCounter,
    /// Cycles that failed and were retried after backoff.
    pub cycle_errors: IntCounter,
    /// Feeds updated (price actually changed).
    pub feeds_updated: IntCounter,
    /// Feeds created for previously-unseen symbols.
    pub feeds_created: IntCounter,
    /// Quotes that matched the stored price exactly.
    pub quotes_unchanged: IntCounter,
    /// Failed provider attempts, labeled by source name.
    pub source_failures: IntCounterVec,
    /// Quotes produced by the synthetic generator.
    pub synthetic_quotes: IntCounter,
    /// History appends that failed (best-effort path).
    pub history_write_failures: IntCounter,
    /// Snapshots dropped because the broadcast transport was down.
    pub broadcast_drops: IntCounter,
    /// Number of active feeds after the latest cycle.
    pub active_feeds: IntGauge,
    /// Unix timestamp of the last completed cycle.
    pub last_cycle_timestamp: Gauge,
}

impl EngineMetrics {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let cycles_completed = IntCounter::with_opts(Opts::new(
            "pricefeed_engine_cycles_completed_total",
            "Completed fetch-reconcile-broadcast cycles",
        ))?;

        let cycle_errors = IntCounter::with_opts(Opts::new(
            "pricefeed_engine_cycle_errors_total",
            "Cycles that failed and were retried",
        ))?;

        let feeds_updated = IntCounter::with_opts(Opts::new(
            "pricefeed_engine_feeds_updated_total",
            "Feed reconciliations that changed the price",
        ))?;

        let feeds_created = IntCounter::with_opts(Opts::new(
            "pricefeed_engine_feeds_created_total",
            "Feeds created for previously-unseen symbols",
        ))?;

        let quotes_unchanged = IntCounter::with_opts(Opts::new(
            "pricefeed_engine_quotes_unchanged_total",
            "Quotes that matched the stored price",
        ))?;

        let source_failures = IntCounterVec::new(
            Opts::new(
                "pricefeed_engine_source_failures_total",
                "Failed provider attempts",
            ),
            &["source"],
        )?;

        let synthetic_quotes = IntCounter::with_opts(Opts::new(
            "pricefeed_engine_synthetic_quotes_total",
            "Quotes produced by the synthetic generator",
        ))?;

        let history_write_failures = IntCounter::with_opts(Opts::new(
            "pricefeed_engine_history_write_failures_total",
            "History appends that failed",
        ))?;

        let broadcast_drops = IntCounter::with_opts(Opts::new(
            "pricefeed_engine_broadcast_drops_total",
            "Snapshots dropped by the broadcast transport",
        ))?;

        let active_feeds = IntGauge::with_opts(Opts::new(
            "pricefeed_engine_active_feeds",
            "Active feeds after the latest cycle",
        ))?;

        let last_cycle_timestamp = Gauge::with_opts(Opts::new(
            "pricefeed_engine_last_cycle_timestamp_seconds",
            "Unix timestamp of the last completed cycle",
        ))?;

        registry.register(Box::new(cycles_completed.clone()))?;
        registry.register(Box::new(cycle_errors.clone()))?;
        registry.register(Box::new(feeds_updated.clone()))?;
        registry.register(Box::new(feeds_created.clone()))?;
        registry.register(Box::new(quotes_unchanged.clone()))?;
        registry.register(Box::new(source_failures.clone()))?;
        registry.register(Box::new(synthetic_quotes.clone()))?;
        registry.register(Box::new(history_write_failures.clone()))?;
        registry.register(Box::new(broadcast_drops.clone()))?;
        registry.register(Box::new(active_feeds.clone()))?;
        registry.register(Box::new(last_cycle_timestamp.clone()))?;

        Ok(Self {
            registry,
            cycles_completed,
            cycle_errors,
            feeds_updated,
            feeds_created,
            quotes_unchanged,
            source_failures,
            synthetic_quotes,
            history_write_failures,
            broadcast_drops,
            active_feeds,
            last_cycle_timestamp,
        })
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_and_render() {
        let metrics = EngineMetrics::new().unwrap();
        metrics.cycles_completed.inc();
        metrics.source_failures.with_label_values(&["coingecko"]).inc();
        metrics.active_feeds.set(11);

        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("pricefeed_engine_cycles_completed_total 1"));
        assert!(rendered.contains("pricefeed_engine_active_feeds 11"));
    }
}

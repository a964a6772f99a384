//! Configuration Module - TOML-based Engine Configuration
//!
//! Loads and validates configuration from `config.toml`. The tracked
//! symbol table, provider endpoints, scheduler intervals, and
//! persistence paths are all externalized here - nothing is hardcoded
//! in the domain layer.

pub mod loader;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::feed::AssetClass;

/// Top-level engine configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the engine begins operation.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Engine identity and logging.
  pub engine: EngineConfig,
  /// Tracked symbol table (the default registry).
  pub symbols: Vec<SymbolConfig>,
  /// Scheduler cycle timing.
  #[serde(default)]
  pub scheduler: SchedulerConfig,
  /// Provider endpoints and per-provider rate limits.
  #[serde(default)]
  pub sources: SourcesConfig,
  /// Synthetic fallback generator bounds.
  #[serde(default)]
  pub synthetic: SyntheticConfig,
  /// History and snapshot persistence.
  #[serde(default)]
  pub persistence: PersistenceConfig,
  /// Query/health/metrics HTTP server.
  #[serde(default)]
  pub api: ApiConfig,
}

/// Engine identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
  /// Human-readable engine name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// One tracked symbol entry.
///
/// This table is the default registry implementation; it is re-read
/// every cycle so additions/removals take effect without a restart.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolConfig {
  /// Uppercase asset identifier (e.g. "BTC").
  pub symbol: String,
  /// Asset class, selecting the provider chain.
  pub asset_class: AssetClass,
  /// Display name override.
  pub display_name: Option<String>,
  /// Base price for the synthetic generator when the symbol has never
  /// been quoted by a real provider.
  pub initial_price: Option<Decimal>,
}

/// Scheduler timing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
  /// Seconds between fetch-reconcile-broadcast cycles.
  #[serde(default = "default_cycle_interval")]
  pub interval_seconds: u64,
  /// Backoff after a failed cycle before retrying.
  #[serde(default = "default_retry_delay")]
  pub retry_delay_seconds: u64,
  /// Per-provider call deadline.
  #[serde(default = "default_source_timeout")]
  pub source_timeout_seconds: u64,
  /// How long shutdown waits for the in-flight cycle.
  #[serde(default = "default_shutdown_grace")]
  pub shutdown_grace_seconds: u64,
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self {
      interval_seconds: default_cycle_interval(),
      retry_delay_seconds: default_retry_delay(),
      source_timeout_seconds: default_source_timeout(),
      shutdown_grace_seconds: default_shutdown_grace(),
    }
  }
}

/// Endpoint and rate limit for a single provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
  /// Base URL of the provider API.
  pub base_url: String,
  /// Minimum seconds between calls to this provider.
  #[serde(default = "default_min_interval")]
  pub min_interval_seconds: u64,
  /// API access key, for providers that require one.
  #[serde(default)]
  pub access_key: Option<String>,
}

impl ProviderConfig {
  fn with_url(base_url: &str) -> Self {
    Self {
      base_url: base_url.to_string(),
      min_interval_seconds: default_min_interval(),
      access_key: None,
    }
  }
}

/// Provider endpoints, in chain order per asset class.
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
  /// CoinGecko — primary crypto source.
  #[serde(default = "default_coingecko")]
  pub coingecko: ProviderConfig,
  /// CoinPaprika — secondary crypto source.
  #[serde(default = "default_coinpaprika")]
  pub coinpaprika: ProviderConfig,
  /// Metals-API — primary metals source.
  #[serde(default = "default_metals_api")]
  pub metals_api: ProviderConfig,
  /// Yahoo Finance chart API — metals ETF proxy fallback.
  #[serde(default = "default_yahoo")]
  pub yahoo: ProviderConfig,
}

impl Default for SourcesConfig {
  fn default() -> Self {
    Self {
      coingecko: default_coingecko(),
      coinpaprika: default_coinpaprika(),
      metals_api: default_metals_api(),
      yahoo: default_yahoo(),
    }
  }
}

/// Synthetic fallback configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyntheticConfig {
  /// Maximum random-walk magnitude as a fraction (0.05 = ±5%).
  #[serde(default = "default_max_walk")]
  pub max_walk_pct: f64,
}

impl Default for SyntheticConfig {
  fn default() -> Self {
    Self {
      max_walk_pct: default_max_walk(),
    }
  }
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
  /// Directory for JSONL history files and feed snapshots.
  #[serde(default = "default_data_dir")]
  pub data_dir: String,
  /// Feed snapshot interval (seconds).
  #[serde(default = "default_snapshot_interval")]
  pub snapshot_interval_seconds: u64,
  /// Days of history to keep when pruning runs.
  #[serde(default = "default_retention_days")]
  pub history_retention_days: u32,
}

impl Default for PersistenceConfig {
  fn default() -> Self {
    Self {
      data_dir: default_data_dir(),
      snapshot_interval_seconds: default_snapshot_interval(),
      history_retention_days: default_retention_days(),
    }
  }
}

/// Query/health/metrics HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Bind address for the read-only facade.
  #[serde(default = "default_bind_address")]
  pub bind_address: String,
  /// Enable the Prometheus /metrics endpoint.
  #[serde(default = "default_true")]
  pub metrics_enabled: bool,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      bind_address: default_bind_address(),
      metrics_enabled: true,
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_cycle_interval() -> u64 {
  30
}

fn default_retry_delay() -> u64 {
  5
}

fn default_source_timeout() -> u64 {
  10
}

fn default_shutdown_grace() -> u64 {
  30
}

fn default_min_interval() -> u64 {
  30
}

fn default_coingecko() -> ProviderConfig {
  ProviderConfig::with_url("https://api.coingecko.com")
}

fn default_coinpaprika() -> ProviderConfig {
  ProviderConfig::with_url("https://api.coinpaprika.com")
}

fn default_metals_api() -> ProviderConfig {
  ProviderConfig::with_url("https://metals-api.com")
}

fn default_yahoo() -> ProviderConfig {
  ProviderConfig::with_url("https://query1.finance.yahoo.com")
}

fn default_max_walk() -> f64 {
  0.05
}

fn default_data_dir() -> String {
  "data".to_string()
}

fn default_snapshot_interval() -> u64 {
  60
}

fn default_retention_days() -> u32 {
  90
}

fn default_bind_address() -> String {
  "0.0.0.0:9090".to_string()
}

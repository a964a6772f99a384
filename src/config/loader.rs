//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config: AppConfig = toml::from_str(&content)
    .with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;

  info!(
    symbols = config.symbols.len(),
    interval_s = config.scheduler.interval_seconds,
    data_dir = %config.persistence.data_dir,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Non-empty, uppercase, unique symbol entries
/// - Positive intervals and timeouts
/// - A sane synthetic walk bound
/// - Non-empty endpoint and path strings
pub fn validate_config(config: &AppConfig) -> Result<()> {
  // Symbol table validation
  anyhow::ensure!(
    !config.symbols.is_empty(),
    "At least one tracked symbol must be configured"
  );

  for (i, entry) in config.symbols.iter().enumerate() {
    anyhow::ensure!(
      !entry.symbol.is_empty(),
      "Symbol entry {} has an empty symbol",
      i
    );
    anyhow::ensure!(
      entry.symbol.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()),
      "Symbol entry {} ({}) must be uppercase alphanumeric",
      i,
      entry.symbol
    );
    if let Some(price) = entry.initial_price {
      anyhow::ensure!(
        price > Decimal::ZERO,
        "Symbol {} has non-positive initial_price {}",
        entry.symbol,
        price
      );
    }
  }

  let mut seen = std::collections::HashSet::new();
  for entry in &config.symbols {
    anyhow::ensure!(
      seen.insert(entry.symbol.as_str()),
      "Duplicate symbol entry: {}",
      entry.symbol
    );
  }

  // Scheduler validation
  anyhow::ensure!(
    config.scheduler.interval_seconds > 0,
    "scheduler.interval_seconds must be positive"
  );
  anyhow::ensure!(
    config.scheduler.retry_delay_seconds > 0,
    "scheduler.retry_delay_seconds must be positive"
  );
  anyhow::ensure!(
    config.scheduler.source_timeout_seconds > 0,
    "scheduler.source_timeout_seconds must be positive"
  );

  // Synthetic walk bound
  anyhow::ensure!(
    config.synthetic.max_walk_pct > 0.0 && config.synthetic.max_walk_pct <= 0.05,
    "synthetic.max_walk_pct must be in (0, 0.05], got {}",
    config.synthetic.max_walk_pct
  );

  // Endpoints
  for (name, provider) in [
    ("coingecko", &config.sources.coingecko),
    ("coinpaprika", &config.sources.coinpaprika),
    ("metals_api", &config.sources.metals_api),
    ("yahoo", &config.sources.yahoo),
  ] {
    anyhow::ensure!(
      !provider.base_url.is_empty(),
      "sources.{} base_url must not be empty",
      name
    );
  }

  // Persistence
  anyhow::ensure!(
    !config.persistence.data_dir.is_empty(),
    "persistence.data_dir must not be empty"
  );
  anyhow::ensure!(
    config.persistence.history_retention_days > 0,
    "persistence.history_retention_days must be positive"
  );

  // API
  anyhow::ensure!(
    !config.api.bind_address.is_empty(),
    "api.bind_address must not be empty"
  );

  Ok(())
}

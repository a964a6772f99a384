//! Config Registry - File-Backed Tracked Symbol Catalog
//!
//! Default `SymbolRegistry` implementation: re-reads the `[[symbols]]`
//! table from `config.toml` on every cycle, so catalog additions and
//! removals take effect on the next cycle without a restart. Polling
//! the file (not a filesystem watcher) avoids portability issues
//! across Linux/macOS/Docker volumes.
//!
//! A failed or malformed re-read falls back to the last good entry
//! set; only a registry that has never produced entries is reported
//! as unreachable.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::SymbolConfig;
use crate::domain::feed::Symbol;
use crate::ports::registry::{SymbolRegistry, TrackedSymbol};

/// Partial view of config.toml: only the symbol table is re-read.
#[derive(Debug, Deserialize)]
struct SymbolTable {
    symbols: Vec<SymbolConfig>,
}

/// File-backed registry with cached fallback.
pub struct ConfigRegistry {
    config_path: String,
    cached: RwLock<Vec<TrackedSymbol>>,
    last_hash: AtomicU64,
}

impl ConfigRegistry {
    /// Create a registry seeded from the already-loaded config.
    pub fn new(config_path: &str, initial: &[SymbolConfig]) -> Self {
        let entries = to_tracked(initial);
        let registry = Self {
            config_path: config_path.to_string(),
            cached: RwLock::new(entries.clone()),
            last_hash: AtomicU64::new(0),
        };
        registry.last_hash.store(hash_entries(&entries), Ordering::Relaxed);
        registry
    }

    async fn reload(&self) -> Result<Vec<TrackedSymbol>> {
        let content = tokio::fs::read_to_string(&self.config_path)
            .await
            .with_context(|| {
                format!("Failed to re-read registry file {}", self.config_path)
            })?;

        let table: SymbolTable = toml::from_str(&content)
            .context("Failed to parse registry symbol table")?;

        Ok(to_tracked(&table.symbols))
    }
}

#[async_trait]
impl SymbolRegistry for ConfigRegistry {
    async fn tracked_symbols(&self) -> Result<Vec<TrackedSymbol>> {
        match self.reload().await {
            Ok(entries) => {
                let hash = hash_entries(&entries);
                if self.last_hash.swap(hash, Ordering::Relaxed) != hash {
                    info!(
                        symbols = entries.len(),
                        "Registry symbol table changed"
                    );
                }
                let mut cached = self.cached.write().await;
                *cached = entries.clone();
                Ok(entries)
            }
            Err(e) => {
                let cached = self.cached.read().await;
                if cached.is_empty() {
                    return Err(e);
                }
                warn!(
                    error = %e,
                    cached = cached.len(),
                    "Registry re-read failed, using last good entries"
                );
                Ok(cached.clone())
            }
        }
    }
}

fn to_tracked(entries: &[SymbolConfig]) -> Vec<TrackedSymbol> {
    entries
        .iter()
        .map(|entry| TrackedSymbol {
            symbol: Symbol::from(entry.symbol.as_str()),
            asset_class: entry.asset_class,
            display_name: entry.display_name.clone(),
        })
        .collect()
}

fn hash_entries(entries: &[TrackedSymbol]) -> u64 {
    let mut hasher = DefaultHasher::new();
    entries.hash(&mut hasher);
    hasher.finish()
}

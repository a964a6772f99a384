//! Symbol Registry Port - Tracked Symbol Catalog Interface
//!
//! The engine does not own the asset catalog; it polls a registry
//! collaborator once per cycle for the set of symbols to track.
//! Additions and removals take effect on the next cycle.

use async_trait::async_trait;

use crate::domain::feed::{AssetClass, Symbol};

/// One entry the registry asks the engine to poll.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackedSymbol {
  /// Asset identifier (uppercase).
  pub symbol: Symbol,
  /// Asset class, selecting the provider chain.
  pub asset_class: AssetClass,
  /// Optional display name override; the engine falls back to its
  /// built-in names when absent.
  pub display_name: Option<String>,
}

/// Trait for the catalog collaborator supplying tracked symbols.
#[async_trait]
pub trait SymbolRegistry: Send + Sync + 'static {
  /// List the symbols the engine must poll this cycle.
  async fn tracked_symbols(&self) -> anyhow::Result<Vec<TrackedSymbol>>;
}

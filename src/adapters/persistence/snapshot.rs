//! Feed Snapshot Store - Atomic JSON Warm-Start Persistence
//!
//! Saves the full feed map to `feeds.json` using atomic writes
//! (write to tmp file, then rename). On restart the engine resumes
//! from the last known-good prices instead of empty feeds, which
//! keeps the "current price is never reset on failure" guarantee
//! across process boundaries.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, instrument};

use crate::domain::feed::Feed;

/// On-disk snapshot format.
#[derive(Debug, Serialize, Deserialize)]
pub struct FeedStateSnapshot {
    /// Snapshot format version.
    pub version: String,
    /// When the snapshot was taken.
    pub saved_at: DateTime<Utc>,
    /// Every feed, active or not.
    pub feeds: Vec<Feed>,
}

/// Atomic JSON snapshot store for feed warm starts.
///
/// State is written to a temporary file first, then atomically
/// renamed, so the file is always either the old or new version,
/// never a partial write.
pub struct FeedSnapshotStore {
    state_path: PathBuf,
    tmp_path: PathBuf,
}

impl FeedSnapshotStore {
    /// Create a snapshot store in the given data directory.
    pub async fn new(data_dir: &str) -> Result<Self> {
        let dir = Path::new(data_dir);
        fs::create_dir_all(dir)
            .await
            .context("Failed to create data directory")?;

        Ok(Self {
            state_path: dir.join("feeds.json"),
            tmp_path: dir.join("feeds.json.tmp"),
        })
    }

    /// Save the feed map atomically (tmp -> rename).
    #[instrument(skip(self, feeds))]
    pub async fn save(&self, feeds: Vec<Feed>, now: DateTime<Utc>) -> Result<()> {
        let snapshot = FeedStateSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            saved_at: now,
            feeds,
        };

        let json = serde_json::to_string_pretty(&snapshot)
            .context("Failed to serialize feed snapshot")?;

        fs::write(&self.tmp_path, &json)
            .await
            .context("Failed to write tmp snapshot file")?;

        fs::rename(&self.tmp_path, &self.state_path)
            .await
            .context("Failed to rename snapshot file")?;

        info!(
            path = %self.state_path.display(),
            feeds = snapshot.feeds.len(),
            "Feed snapshot saved"
        );

        Ok(())
    }

    /// Load the most recent snapshot.
    ///
    /// Returns `None` if no snapshot exists (first startup).
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Option<Vec<Feed>>> {
        if !self.state_path.exists() {
            info!("No feed snapshot found, starting fresh");
            return Ok(None);
        }

        let json = fs::read_to_string(&self.state_path)
            .await
            .context("Failed to read snapshot file")?;

        let snapshot: FeedStateSnapshot =
            serde_json::from_str(&json).context("Failed to parse snapshot JSON")?;

        info!(
            feeds = snapshot.feeds.len(),
            saved_at = %snapshot.saved_at,
            "Feed snapshot loaded"
        );

        Ok(Some(snapshot.feeds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::feed::AssetClass;
    use rust_decimal_macros::dec;

    fn feed(symbol: &str) -> Feed {
        Feed {
            symbol: symbol.to_string(),
            display_name: symbol.to_string(),
            asset_class: AssetClass::Crypto,
            current_price: dec!(45000),
            change_24h: dec!(100),
            change_pct_24h: dec!(0.22),
            volume_24h: None,
            market_cap: None,
            is_active: true,
            last_updated: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = std::env::temp_dir().join(format!(
            "pricefeed-snapshot-{}",
            std::process::id()
        ));
        let _ = tokio::fs::remove_dir_all(&dir).await;
        let store = FeedSnapshotStore::new(dir.to_str().unwrap()).await.unwrap();

        store
            .save(vec![feed("BTC"), feed("ETH")], Utc::now())
            .await
            .unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].current_price, dec!(45000));

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_load_without_snapshot_is_none() {
        let dir = std::env::temp_dir().join(format!(
            "pricefeed-snapshot-none-{}",
            std::process::id()
        ));
        let _ = tokio::fs::remove_dir_all(&dir).await;
        let store = FeedSnapshotStore::new(dir.to_str().unwrap()).await.unwrap();
        assert!(store.load().await.unwrap().is_none());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}

//! History Store - Append-only JSONL Price History
//!
//! Persists history points to daily JSONL files in the format
//! `history/YYYY-MM-DD.jsonl`. Each line is a self-contained JSON
//! record for easy parsing, streaming, and crash recovery.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

use crate::domain::feed::HistoryPoint;
use crate::ports::history::HistoryStore;

/// Append-only JSONL history store with daily file rotation.
///
/// Files are named `history/YYYY-MM-DD.jsonl`; each line is a complete
/// JSON object. The format is optimized for:
/// - Append-only writes (no read-modify-write)
/// - Line-by-line streaming for charting queries
/// - Natural daily partitioning for age-based pruning
pub struct JsonlHistoryStore {
    history_dir: PathBuf,
}

impl JsonlHistoryStore {
    /// Create a history store in the given data directory.
    pub async fn new(data_dir: &str) -> Result<Self> {
        let history_dir = Path::new(data_dir).join("history");
        fs::create_dir_all(&history_dir)
            .await
            .context("Failed to create history directory")?;
        Ok(Self { history_dir })
    }

    fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.history_dir
            .join(format!("{}.jsonl", date.format("%Y-%m-%d")))
    }

    /// Daily files whose date falls within `[since, until]`, ascending.
    fn files_in_range(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Vec<PathBuf> {
        let mut day = since.date_naive();
        let last = until.date_naive();
        let mut files = Vec::new();
        while day <= last && files.len() <= 4000 {
            files.push(self.file_for(day));
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        files
    }
}

#[async_trait]
impl HistoryStore for JsonlHistoryStore {
    #[instrument(skip(self, point), fields(symbol = %point.symbol))]
    async fn append(&self, point: &HistoryPoint) -> Result<()> {
        let path = self.file_for(point.observed_at.date_naive());

        let mut json = serde_json::to_string(point)
            .context("Failed to serialize history point")?;
        json.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .context("Failed to open history file")?;

        file.write_all(json.as_bytes())
            .await
            .context("Failed to write history point")?;
        file.flush().await.context("Failed to flush history file")?;

        Ok(())
    }

    async fn range(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<HistoryPoint>> {
        let mut points = Vec::new();

        for path in self.files_in_range(since, until) {
            if !path.exists() {
                continue;
            }
            let content = fs::read_to_string(&path).await?;
            for line in content.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<HistoryPoint>(line) {
                    Ok(point) => {
                        if point.symbol == symbol
                            && point.observed_at >= since
                            && point.observed_at <= until
                        {
                            points.push(point);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            file = %path.display(),
                            error = %e,
                            "Skipping malformed history line"
                        );
                    }
                }
            }
        }

        points.sort_by_key(|p| p.observed_at);
        Ok(points)
    }

    #[instrument(skip(self))]
    async fn prune_before(&self, cutoff: NaiveDate) -> Result<u64> {
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.history_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") else {
                continue;
            };
            if date < cutoff {
                fs::remove_file(&path).await?;
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, cutoff = %cutoff, "Pruned old history files");
        }
        Ok(removed)
    }
}

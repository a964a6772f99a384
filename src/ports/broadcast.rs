//! Broadcast Sink Port - Live Update Fan-out Interface
//!
//! The engine publishes a full snapshot (not a diff) after every
//! cycle. Delivery is best-effort by contract:
//! implementations log transport failures and return — they never
//! retry synchronously and never propagate an error into the pipeline.
//! Price correctness is mandatory; notification is not.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::feed::{Feed, MovementStats};

/// Full per-cycle snapshot delivered to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSnapshot {
  /// Every active feed, post-reconciliation.
  pub feeds: Vec<Feed>,
  /// Today's global movement counters.
  pub movement: MovementStats,
  /// Monotonic cycle counter since engine start.
  pub cycle: u64,
  /// When the snapshot was assembled.
  pub published_at: DateTime<Utc>,
}

/// Trait for the injected publish transport.
#[async_trait]
pub trait BroadcastSink: Send + Sync + 'static {
  /// Publish a snapshot to all subscribers. Infallible by contract;
  /// implementations swallow and log transport failures.
  async fn publish(&self, snapshot: &FeedSnapshot);
}

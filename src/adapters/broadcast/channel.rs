//! Channel Broadcaster - In-Process Snapshot Fan-out
//!
//! Default `BroadcastSink` implementation over a `tokio::sync::broadcast`
//! channel. Live subscribers (WebSocket bridges, in-process consumers)
//! attach via `subscribe()`. Publishing is strictly best-effort: a send
//! with no receivers or with lagged receivers never blocks or fails the
//! pipeline — price correctness is mandatory, delivery is not.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::ports::broadcast::{BroadcastSink, FeedSnapshot};

/// Broadcast-channel sink for in-process subscribers.
pub struct ChannelBroadcaster {
    snapshot_tx: broadcast::Sender<FeedSnapshot>,
}

impl ChannelBroadcaster {
    /// Create a broadcaster with the given channel capacity.
    ///
    /// Slow subscribers that fall more than `capacity` snapshots
    /// behind observe a lag error and skip ahead; the publisher is
    /// never affected.
    pub fn new(capacity: usize) -> Self {
        let (snapshot_tx, _) = broadcast::channel(capacity);
        Self { snapshot_tx }
    }

    /// Get a receiver for published snapshots.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.snapshot_tx.receiver_count()
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl BroadcastSink for ChannelBroadcaster {
    async fn publish(&self, snapshot: &FeedSnapshot) {
        match self.snapshot_tx.send(snapshot.clone()) {
            Ok(delivered) => {
                debug!(
                    cycle = snapshot.cycle,
                    feeds = snapshot.feeds.len(),
                    subscribers = delivered,
                    "Snapshot broadcast"
                );
            }
            Err(_) => {
                // No receivers attached. Normal when nothing is
                // listening yet; the snapshot is simply dropped.
                warn!(
                    cycle = snapshot.cycle,
                    "Snapshot dropped, no broadcast subscribers"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::feed::{MovementStats, GLOBAL_SCOPE};
    use chrono::Utc;

    fn snapshot(cycle: u64) -> FeedSnapshot {
        FeedSnapshot {
            feeds: Vec::new(),
            movement: MovementStats::new(GLOBAL_SCOPE, Utc::now().date_naive()),
            cycle,
            published_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_snapshot() {
        let broadcaster = ChannelBroadcaster::new(8);
        let mut rx = broadcaster.subscribe();

        broadcaster.publish(&snapshot(3)).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.cycle, 3);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_does_not_fail() {
        let broadcaster = ChannelBroadcaster::new(8);
        // Must not panic or block.
        broadcaster.publish(&snapshot(1)).await;
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_lagged_subscriber_does_not_block_publisher() {
        let broadcaster = ChannelBroadcaster::new(2);
        let mut rx = broadcaster.subscribe();

        for cycle in 0..10 {
            broadcaster.publish(&snapshot(cycle)).await;
        }

        // The receiver lags, then skips ahead; the publisher already
        // completed all ten sends.
        let result = rx.recv().await;
        assert!(matches!(
            result,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }
}

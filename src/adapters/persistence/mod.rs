//! Persistence Adapters - JSONL and Atomic-JSON File Storage
//!
//! Implements the history port with append-only daily JSONL files and
//! provides atomic feed snapshots for warm starts. No database
//! dependency — lightweight and crash-recoverable.

pub mod history;
pub mod snapshot;

pub use history::JsonlHistoryStore;
pub use snapshot::FeedSnapshotStore;

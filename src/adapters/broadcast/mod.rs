//! Broadcast Adapters - Snapshot Delivery Transports
//!
//! Implements the `BroadcastSink` port. The default transport is an
//! in-process broadcast channel; a pub/sub or message-queue bridge
//! would slot in behind the same trait.

pub mod channel;

pub use channel::ChannelBroadcaster;

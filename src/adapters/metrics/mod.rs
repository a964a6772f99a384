//! Metrics Adapters - Prometheus Export
//!
//! Centralized metric registration for the engine; the text
//! exposition endpoint lives on the API server.

pub mod prometheus;

pub use prometheus::EngineMetrics;

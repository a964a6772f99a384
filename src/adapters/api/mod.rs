//! API Adapters - HTTP Query Facade
//!
//! JSON facade over the engine's read-only query surface, plus
//! health probes and the Prometheus endpoint.

pub mod server;

pub use server::{serve, ApiState};

//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the domain/usecases layer
//! requires from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `QuoteSource`: batch price fetching from an external provider
//! - `SymbolRegistry`: the catalog collaborator listing tracked symbols
//! - `BroadcastSink`: best-effort snapshot fan-out to subscribers
//! - `HistoryStore`: append-only price history persistence

pub mod broadcast;
pub mod history;
pub mod quote_source;
pub mod registry;

//! API Server - Read-only Query Facade and Health Endpoints
//!
//! Serves the engine's query surface as JSON plus liveness/readiness
//! probes and the Prometheus exposition endpoint:
//!
//! - `GET /live`                      — liveness probe
//! - `GET /ready`                     — readiness (503 during shutdown)
//! - `GET /metrics`                   — Prometheus text format
//! - `GET /feeds`                     — all active feeds (`?all=true` for inactive too)
//! - `GET /feeds/:symbol`             — one feed
//! - `GET /feeds/:symbol/history`     — history range (`?since=&until=`, default trailing 24h)
//! - `GET /stats/:scope`              — movement stats (`?date=`, default today)
//!
//! Strictly read-only; readers never observe transient upstream
//! failures — they see the last known-good values, timestamped via
//! `last_updated`.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{error, info};

use crate::adapters::metrics::EngineMetrics;
use crate::domain::feed::{Feed, HistoryPoint, MovementStats};
use crate::ports::history::HistoryStore;
use crate::usecases::feed_store::FeedStore;
use crate::usecases::movement::MovementAggregator;

/// Shared state for all API handlers.
#[derive(Clone)]
pub struct ApiState {
    /// Canonical feed map (read-only access).
    pub store: Arc<FeedStore>,
    /// Movement statistics (read-only access).
    pub movements: Arc<MovementAggregator>,
    /// History store for range queries.
    pub history: Arc<dyn HistoryStore>,
    /// Prometheus registry.
    pub metrics: Arc<EngineMetrics>,
    /// Readiness flag; false during graceful shutdown.
    pub ready: watch::Receiver<bool>,
    /// Whether /metrics is exposed.
    pub metrics_enabled: bool,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    /// Include deactivated feeds.
    #[serde(default)]
    all: bool,
}

#[derive(Debug, Deserialize)]
struct RangeParams {
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct StatsParams {
    date: Option<NaiveDate>,
}

/// Build the router over the given state.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/live", get(|| async { StatusCode::OK }))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .route("/feeds", get(list_feeds))
        .route("/feeds/:symbol", get(get_feed))
        .route("/feeds/:symbol/history", get(get_history))
        .route("/stats/:scope", get(get_stats))
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(state: ApiState, bind_address: &str) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!(address = bind_address, "API server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn ready(State(state): State<ApiState>) -> StatusCode {
    if *state.ready.borrow() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics(
    State(state): State<ApiState>,
) -> Result<String, StatusCode> {
    if !state.metrics_enabled {
        return Err(StatusCode::NOT_FOUND);
    }
    state.metrics.render().map_err(|e| {
        error!(error = %e, "Metrics render failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn list_feeds(
    State(state): State<ApiState>,
    Query(params): Query<ListParams>,
) -> Json<Vec<Feed>> {
    Json(state.store.list_feeds(!params.all).await)
}

async fn get_feed(
    State(state): State<ApiState>,
    Path(symbol): Path<String>,
) -> Result<Json<Feed>, StatusCode> {
    state
        .store
        .get_feed(&symbol)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn get_history(
    State(state): State<ApiState>,
    Path(symbol): Path<String>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<HistoryPoint>>, StatusCode> {
    let until = params.until.unwrap_or_else(Utc::now);
    let since = params.since.unwrap_or(until - Duration::hours(24));

    state
        .history
        .range(&symbol, since, until)
        .await
        .map(Json)
        .map_err(|e| {
            error!(symbol = %symbol, error = %e, "History query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

async fn get_stats(
    State(state): State<ApiState>,
    Path(scope): Path<String>,
    Query(params): Query<StatsParams>,
) -> Result<Json<MovementStats>, StatusCode> {
    let date = params.date.unwrap_or_else(|| Utc::now().date_naive());
    state
        .movements
        .stats_for(&scope, date)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok")
    pub status: String,
    /// Module name ("cratemind-ai")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Jobs still processing
    pub active_jobs: usize,
    /// Jobs held in the registry, terminal ones included
    pub tracked_jobs: usize,
    pub genres: usize,
    /// Error of the most recently failed job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let jobs = state.orchestrator.jobs();
    let active_jobs = jobs.processing_count().await;
    let tracked_jobs = jobs.len().await;
    let genres = state.orchestrator.taxonomy().read().await.len();
    let last_error = state.orchestrator.last_error().await;

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "cratemind-ai".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        active_jobs,
        tracked_jobs,
        genres,
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

//! cratemind-ai library interface
//!
//! Audio analysis orchestration: an external analysis engine produces raw
//! descriptors, correction heuristics fix tempo and fill gaps, a genre
//! taxonomy classifies each track, and a Track Store persists the result.
//! Work runs as tracked background jobs behind an HTTP API.

pub mod api;
pub mod config;
pub mod correction;
pub mod engine;
pub mod enrichment;
pub mod error;
pub mod jobs;
pub mod models;
pub mod orchestrator;
pub mod store;
pub mod taxonomy;

pub use crate::error::{ApiError, ApiResult};
pub use crate::orchestrator::BatchOrchestrator;

use axum::Router;
use chrono::{DateTime, Utc};
use cratemind_common::events::EventBus;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: BatchOrchestrator,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(orchestrator: BatchOrchestrator) -> Self {
        Self {
            event_bus: orchestrator.events().clone(),
            orchestrator,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::analysis_routes())
        .merge(api::track_routes())
        .merge(api::genre_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

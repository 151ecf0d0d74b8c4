//! Track Store handlers

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    models::{Provenance, Track},
    store::TrackFilter,
    AppState,
};

/// GET /tracks query
#[derive(Debug, Default, Deserialize)]
pub struct TracksQuery {
    pub provenance: Option<String>,
    #[serde(default)]
    pub missing_enrichment: bool,
}

#[derive(Debug, Serialize)]
pub struct TracksResponse {
    pub count: usize,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Serialize)]
pub struct DedupeResponse {
    pub removed: Vec<String>,
}

impl TracksQuery {
    fn filter(&self) -> ApiResult<TrackFilter> {
        match (self.provenance.as_deref(), self.missing_enrichment) {
            (Some(_), true) => Err(ApiError::BadRequest(
                "provenance and missing_enrichment cannot be combined".to_string(),
            )),
            (Some(p), false) => p
                .parse::<Provenance>()
                .map(TrackFilter::Provenance)
                .map_err(ApiError::BadRequest),
            (None, true) => Ok(TrackFilter::MissingEnrichment),
            (None, false) => Ok(TrackFilter::All),
        }
    }
}

/// GET /tracks
pub async fn list_tracks(
    State(state): State<AppState>,
    Query(query): Query<TracksQuery>,
) -> ApiResult<Json<TracksResponse>> {
    let tracks = state
        .orchestrator
        .store()
        .get_tracks_by_filter(query.filter()?)
        .await?;

    Ok(Json(TracksResponse {
        count: tracks.len(),
        tracks,
    }))
}

/// GET /tracks/:id
pub async fn get_track(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Track>> {
    state
        .orchestrator
        .store()
        .get_track(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Track not found: {}", id)))
}

/// POST /tracks/dedupe
pub async fn dedupe(State(state): State<AppState>) -> ApiResult<Json<DedupeResponse>> {
    let removed = state.orchestrator.remove_duplicate_uploads().await?;
    Ok(Json(DedupeResponse { removed }))
}

/// Build track routes
pub fn track_routes() -> Router<AppState> {
    Router::new()
        .route("/tracks", get(list_tracks))
        .route("/tracks/dedupe", post(dedupe))
        .route("/tracks/:id", get(get_track))
}

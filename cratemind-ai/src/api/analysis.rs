//! Analysis job handlers
//!
//! POST /analysis/batch, POST /analysis/refresh, POST /analysis/enrich,
//! GET /analysis/status/:job_id

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    jobs::JobSnapshot,
    models::Provenance,
    orchestrator::{JobTicket, TrackSubmission},
    store::TrackFilter,
    AppState,
};

/// POST /analysis/batch request
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub files: Vec<TrackSubmission>,
}

/// POST /analysis/refresh query
#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    pub provenance: Option<String>,
}

/// POST /analysis/enrich query
#[derive(Debug, Default, Deserialize)]
pub struct EnrichQuery {
    pub limit: Option<usize>,
}

/// POST /analysis/batch
///
/// Returns 202 Accepted with the job id as soon as the job exists.
pub async fn submit_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> ApiResult<(StatusCode, Json<JobTicket>)> {
    if let Some(index) = request.files.iter().position(|f| f.path.trim().is_empty()) {
        return Err(ApiError::BadRequest(format!(
            "files[{}].path must not be empty",
            index
        )));
    }

    let ticket = state.orchestrator.submit(request.files).await;
    tracing::info!(job_id = %ticket.job_id, total = ticket.total, "Analysis batch accepted");

    Ok((StatusCode::ACCEPTED, Json(ticket)))
}

/// POST /analysis/refresh
///
/// Re-analyze stored tracks, uploads unless `?provenance=` says otherwise.
pub async fn refresh(
    State(state): State<AppState>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<(StatusCode, Json<JobTicket>)> {
    let filter = query
        .provenance
        .as_deref()
        .map(|p| p.parse::<Provenance>().map(TrackFilter::Provenance))
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let ticket = state.orchestrator.submit_reanalysis(filter).await?;
    Ok((StatusCode::ACCEPTED, Json(ticket)))
}

/// POST /analysis/enrich
pub async fn enrich(
    State(state): State<AppState>,
    Query(query): Query<EnrichQuery>,
) -> ApiResult<(StatusCode, Json<JobTicket>)> {
    if !state.orchestrator.has_enrichment() {
        return Err(ApiError::Conflict(
            "No enrichment source configured".to_string(),
        ));
    }

    let ticket = state.orchestrator.submit_enrichment(query.limit).await?;
    Ok((StatusCode::ACCEPTED, Json(ticket)))
}

/// GET /analysis/status/:job_id
///
/// 404 for unknown and expired jobs alike.
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    let job_id = Uuid::parse_str(&job_id)
        .map_err(|_| ApiError::BadRequest(format!("Invalid job id: {}", job_id)))?;

    state
        .orchestrator
        .jobs()
        .get(job_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Job not found: {}", job_id)))
}

/// Build analysis routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/analysis/batch", post(submit_batch))
        .route("/analysis/refresh", post(refresh))
        .route("/analysis/enrich", post(enrich))
        .route("/analysis/status/:job_id", get(job_status))
}

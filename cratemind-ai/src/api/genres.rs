//! Genre taxonomy handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    taxonomy::{GenreDefinition, GenreNode, GenreTree},
    AppState,
};

/// GET /genres/classify query
#[derive(Debug, Deserialize)]
pub struct ClassifyQuery {
    pub tempo: f64,
    pub energy: f64,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    /// Deepest, narrowest match
    pub best: Option<GenreNode>,
    pub candidates: Vec<GenreNode>,
}

/// PUT /genres/:slug/parent request; `null` makes the genre a root
#[derive(Debug, Deserialize)]
pub struct ReparentRequest {
    pub parent: Option<String>,
}

/// GET /genres
pub async fn genre_tree(State(state): State<AppState>) -> Json<Vec<GenreTree>> {
    let taxonomy = state.orchestrator.taxonomy().read().await;
    Json(taxonomy.tree())
}

/// GET /genres/classify
pub async fn classify(
    State(state): State<AppState>,
    Query(query): Query<ClassifyQuery>,
) -> ApiResult<Json<ClassifyResponse>> {
    if !query.tempo.is_finite() || query.tempo <= 0.0 {
        return Err(ApiError::BadRequest(format!("Invalid tempo: {}", query.tempo)));
    }
    if !query.energy.is_finite() {
        return Err(ApiError::BadRequest(format!("Invalid energy: {}", query.energy)));
    }

    let taxonomy = state.orchestrator.taxonomy().read().await;
    let candidates: Vec<GenreNode> = taxonomy
        .classify(query.tempo, query.energy)
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(ClassifyResponse {
        best: candidates.first().cloned(),
        candidates,
    }))
}

/// GET /genres/:slug
pub async fn get_genre(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<GenreNode>> {
    let taxonomy = state.orchestrator.taxonomy().read().await;
    let node = taxonomy.get(&slug).cloned();
    node.map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown genre: {}", slug)))
}

/// GET /genres/:slug/lineage
///
/// Root first, the requested genre last.
pub async fn lineage(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Vec<GenreNode>>> {
    let taxonomy = state.orchestrator.taxonomy().read().await;
    let path = taxonomy.lineage(&slug)?.into_iter().cloned().collect();
    Ok(Json(path))
}

/// POST /genres
pub async fn create_genre(
    State(state): State<AppState>,
    Json(def): Json<GenreDefinition>,
) -> ApiResult<(StatusCode, Json<GenreNode>)> {
    let mut taxonomy = state.orchestrator.taxonomy().write().await;
    let node = taxonomy.insert(def)?.clone();
    tracing::info!(slug = %node.slug, parent = ?node.parent_slug, "Genre added");
    Ok((StatusCode::CREATED, Json(node)))
}

/// PUT /genres/:slug/parent
pub async fn reparent(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(request): Json<ReparentRequest>,
) -> ApiResult<Json<GenreNode>> {
    let mut taxonomy = state.orchestrator.taxonomy().write().await;
    taxonomy.reparent(&slug, request.parent.as_deref())?;

    let node = taxonomy
        .get(&slug)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("Unknown genre: {}", slug)))?;
    tracing::info!(slug = %slug, parent = ?node.parent_slug, "Genre moved");
    Ok(Json(node))
}

/// Build genre routes
pub fn genre_routes() -> Router<AppState> {
    Router::new()
        .route("/genres", get(genre_tree).post(create_genre))
        .route("/genres/classify", get(classify))
        .route("/genres/:slug", get(get_genre))
        .route("/genres/:slug/lineage", get(lineage))
        .route("/genres/:slug/parent", put(reparent))
}

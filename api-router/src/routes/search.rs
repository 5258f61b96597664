use axum::{extract::State, response::IntoResponse, Extension, Json};
use serde::Deserialize;

use common::{error::AppError, utils::counters::Operation};
use retrieval_pipeline::DEFAULT_ANSWER_LIMIT;

use crate::{api_state::ApiState, error::ApiError, middleware_identity::UserId};

const DEFAULT_SEARCH_LIMIT: usize = 10;
const MAX_SEARCH_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: Option<usize>,
}

fn validated_query(request: &SearchRequest) -> Result<&str, AppError> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(AppError::InvalidInput("empty query".into()));
    }
    Ok(query)
}

/// Hybrid chunk search: vector similarity fused with full-text rank.
pub async fn search(
    State(state): State<ApiState>,
    Extension(user): Extension<UserId>,
    Json(request): Json<SearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.counters.record(&user.0, Operation::Search);

    let query = validated_query(&request)?;
    let limit = request
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);

    let results =
        retrieval_pipeline::search(&state.db, &state.embedder, &user.0, query, limit).await?;

    Ok(Json(results))
}

/// Two-stage QA search: hybrid retrieval, then per-candidate answer
/// extraction ranked by confidence. No answers is a normal, empty result.
pub async fn qa_search(
    State(state): State<ApiState>,
    Extension(user): Extension<UserId>,
    Json(request): Json<SearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.counters.record(&user.0, Operation::QaSearch);

    let query = validated_query(&request)?;
    let limit = request
        .limit
        .unwrap_or(DEFAULT_ANSWER_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);

    let results = retrieval_pipeline::qa_search(
        &state.db,
        &state.embedder,
        &state.extractor,
        &user.0,
        query,
        limit,
    )
    .await?;

    Ok(Json(results))
}

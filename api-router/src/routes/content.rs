use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;

use common::{
    error::AppError,
    storage::types::{
        chunk::Chunk,
        content_item::{ContentItem, ContentType},
    },
    utils::counters::Operation,
};

use crate::{api_state::ApiState, error::ApiError, middleware_identity::UserId};

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
pub struct ListContentParams {
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub limit: Option<usize>,
}

pub async fn list_content(
    State(state): State<ApiState>,
    Extension(user): Extension<UserId>,
    Query(params): Query<ListContentParams>,
) -> Result<impl IntoResponse, ApiError> {
    state.counters.record(&user.0, Operation::ContentList);

    let content_type = params
        .content_type
        .as_deref()
        .map(ContentType::parse)
        .transpose()?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(MAX_LIST_LIMIT);

    let items = ContentItem::get_for_user(&state.db, &user.0, content_type, limit).await?;

    Ok(Json(items))
}

/// A content item with its chunks in reading order.
pub async fn get_content(
    State(state): State<ApiState>,
    Extension(user): Extension<UserId>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.counters.record(&user.0, Operation::ContentGet);

    let item = ContentItem::get_owned(&state.db, &id, &user.0)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("content item {id}")))?;

    let chunks = Chunk::get_for_content_item(&state.db, &item.id, &user.0).await?;

    Ok(Json(json!({ "item": item, "chunks": chunks })))
}

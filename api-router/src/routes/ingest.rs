use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use serde_json::json;
use tracing::info;

use common::{error::AppError, utils::counters::Operation};

use crate::{api_state::ApiState, error::ApiError, middleware_identity::UserId};

#[derive(Debug, TryFromMultipart)]
pub struct IngestDocumentRequest {
    #[form_data(limit = "unlimited")]
    pub document: FieldData<Bytes>,
}

/// Accepts a document upload and returns as soon as the content item is
/// persisted; chunking and embedding continue in the background worker.
pub async fn ingest_document(
    State(state): State<ApiState>,
    Extension(user): Extension<UserId>,
    TypedMultipart(input): TypedMultipart<IngestDocumentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.counters.record(&user.0, Operation::Ingest);

    let filename = input
        .document
        .metadata
        .file_name
        .clone()
        .ok_or_else(|| AppError::InvalidInput("missing document file name".into()))?;

    info!(%filename, bytes = input.document.contents.len(), "received document upload");

    let item = state
        .pipeline
        .ingest_document(&user.0, &filename, &input.document.contents)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "content_id": item.id,
            "title": item.title,
            "content_type": item.content_type,
            "file_size": item.file_size,
        })),
    ))
}

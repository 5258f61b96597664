use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::error::AppError;
use serde::Serialize;
use thiserror::Error;

/// HTTP-facing error: a core error with its machine tag, or a missing
/// identity. Internal failure classes keep their tag on the wire but leak
/// no detail.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl ApiError {
    fn status_and_body(&self) -> (StatusCode, ErrorResponse) {
        match self {
            Self::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    error: "Unauthorized".to_string(),
                    message: message.clone(),
                },
            ),
            Self::App(err) => {
                let tag = err.machine_tag();
                let (status, message) = match err {
                    AppError::InvalidInput(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                    AppError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                    AppError::UnsupportedFormat(_)
                    | AppError::Encrypted
                    | AppError::EmptyContent => {
                        (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
                    }
                    AppError::Store(_)
                    | AppError::Embedding(_)
                    | AppError::Llm(_)
                    | AppError::Timeout(_) => {
                        tracing::error!("internal error: {err:?}");
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "internal server error".to_string(),
                        )
                    }
                };
                (
                    status,
                    ErrorResponse {
                        error: tag.to_string(),
                        message,
                    },
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

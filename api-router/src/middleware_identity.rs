use axum::{extract::Request, middleware::Next, response::Response};

use crate::error::ApiError;

/// Opaque user identity forwarded by the authenticating host.
#[derive(Debug, Clone)]
pub struct UserId(pub String);

/// Authentication itself is a host concern; the core only requires that
/// every protected request carries an identity to scope by.
pub async fn require_user_identity(
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = request
        .headers()
        .get("X-User-Id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
        .ok_or_else(|| ApiError::Unauthorized("missing user identity".to_string()))?;

    request.extensions_mut().insert(UserId(user_id));

    Ok(next.run(request).await)
}

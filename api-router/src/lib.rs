use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use middleware_identity::require_user_identity;
use routes::{
    content::{get_content, list_content},
    ingest::ingest_document,
    liveness::live,
    readiness::ready,
    search::{qa_search, search},
};

pub mod api_state;
pub mod error;
pub mod middleware_identity;
mod routes;

/// Router for API functionality, version 1
pub fn api_routes_v1<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Public, unauthenticated endpoints (for k8s/systemd probes)
    let public = Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live));

    // Endpoints scoped to the host-forwarded user identity
    let protected = Router::new()
        .route(
            "/ingest/document",
            post(ingest_document).layer(DefaultBodyLimit::max(
                app_state.config.ingest_max_body_bytes,
            )),
        )
        .route("/content", get(list_content))
        .route("/content/{id}", get(get_content))
        .route("/search", post(search))
        .route("/search/qa", post(qa_search))
        .route_layer(from_fn(require_user_identity));

    public.merge(protected)
}

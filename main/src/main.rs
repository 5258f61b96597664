use std::sync::Arc;

use api_router::{api_routes_v1, api_state::ApiState};
use axum::Router;
use common::{
    storage::db::SurrealDbClient,
    utils::{config::get_config, embedding::EmbeddingProvider},
};
use ingestion_pipeline::{pipeline::IngestionPipeline, run_worker_loop};
use retrieval_pipeline::client_from_config;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Combined process: HTTP server plus the ingestion worker, sharing one
/// store connection pool.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config()?;

    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );

    db.apply_migrations().await?;
    db.ensure_vector_index(config.embedding_dimensions as usize)
        .await?;

    let embedder = Arc::new(EmbeddingProvider::from_config(&config));
    info!(
        embedding_model = embedder.model_tag(),
        embedding_dimension = embedder.dimension(),
        mock = embedder.is_mock(),
        "embedding provider initialized"
    );

    let llm = client_from_config(&config)?;
    let api_state = ApiState::with_resources(db.clone(), embedder.clone(), llm, config.clone());

    let worker_pipeline = Arc::new(IngestionPipeline::new(
        db.clone(),
        embedder.clone(),
        config.clone(),
    ));
    let worker_db = db.clone();
    tokio::spawn(async move {
        info!("starting ingestion worker");
        if let Err(e) = run_worker_loop(worker_db, worker_pipeline).await {
            error!("ingestion worker error: {e}");
        }
    });

    let app = Router::new()
        .nest("/api/v1", api_routes_v1(&api_state))
        .with_state(api_state);

    let serve_address = format!("0.0.0.0:{}", config.http_port);
    info!("starting server listening on {serve_address}");
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

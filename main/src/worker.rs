use std::sync::Arc;

use common::{
    storage::db::SurrealDbClient,
    utils::{config::get_config, embedding::EmbeddingProvider},
};
use ingestion_pipeline::{pipeline::IngestionPipeline, run_worker_loop};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Worker-only process: drains and follows the ingestion task queue.
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
    let ingestion_pipeline = Arc::new(IngestionPipeline::new(db.clone(), embedder, config));

    run_worker_loop(db, ingestion_pipeline).await?;

    Ok(())
}

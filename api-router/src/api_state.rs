use std::sync::Arc;

use common::{
    storage::db::SurrealDbClient,
    utils::{config::AppConfig, counters::OperationCounters, embedding::EmbeddingProvider},
};
use ingestion_pipeline::pipeline::IngestionPipeline;
use retrieval_pipeline::{client_from_config, AnswerExtractor};

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub embedder: Arc<EmbeddingProvider>,
    pub extractor: Arc<AnswerExtractor>,
    pub pipeline: Arc<IngestionPipeline>,
    pub counters: Arc<OperationCounters>,
    pub config: AppConfig,
}

impl ApiState {
    /// Connects the store, applies migrations and wires the providers
    /// selected by configuration.
    pub async fn new(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
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

        let embedder = Arc::new(EmbeddingProvider::from_config(config));
        let llm = client_from_config(config)?;

        Ok(Self::with_resources(db, embedder, llm, config.clone()))
    }

    /// Assembles state from already-built resources; used by the binaries
    /// (which share resources with the worker) and by tests.
    pub fn with_resources(
        db: Arc<SurrealDbClient>,
        embedder: Arc<EmbeddingProvider>,
        llm: Arc<dyn retrieval_pipeline::LlmClient>,
        config: AppConfig,
    ) -> Self {
        let pipeline = Arc::new(IngestionPipeline::new(
            db.clone(),
            embedder.clone(),
            config.clone(),
        ));

        Self {
            db,
            embedder,
            extractor: Arc::new(AnswerExtractor::new(llm)),
            pipeline,
            counters: Arc::new(OperationCounters::new()),
            config,
        }
    }
}

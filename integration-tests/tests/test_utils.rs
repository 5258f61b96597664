use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum_test::TestServer;
use uuid::Uuid;

use api_router::{api_routes_v1, api_state::ApiState};
use common::{
    error::AppError,
    storage::db::SurrealDbClient,
    utils::{config::AppConfig, embedding::EmbeddingProvider},
};
use retrieval_pipeline::{LlmClient, LlmResponse};

pub const TEST_DIMENSIONS: u32 = 8;

/// Deterministic stand-in for a real extraction provider: confident when
/// the chunk literally contains a keyword of the query, silent otherwise.
pub struct KeywordLlm;

#[async_trait]
impl LlmClient for KeywordLlm {
    async fn extract_answer(&self, query: &str, chunk: &str) -> Result<LlmResponse, AppError> {
        let keyword = query
            .split_whitespace()
            .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|word| word.chars().count() > 3)
            .max_by_key(|word| word.chars().count())
            .unwrap_or_default()
            .to_lowercase();

        let sentence = chunk
            .split(['.', '!', '?'])
            .find(|sentence| sentence.to_lowercase().contains(&keyword));

        match sentence {
            Some(sentence) if !keyword.is_empty() => Ok(LlmResponse {
                answer: sentence.trim().to_string(),
                confidence: 0.9,
                has_answer: true,
                reasoning: "keyword present in chunk".into(),
            }),
            _ => Ok(LlmResponse {
                answer: String::new(),
                confidence: 0.0,
                has_answer: false,
                reasoning: "keyword absent".into(),
            }),
        }
    }
}

/// In-memory store with migrations and a small vector index applied.
pub async fn setup_test_database() -> Arc<SurrealDbClient> {
    let database = Uuid::new_v4().to_string();

    let db = Arc::new(
        SurrealDbClient::memory("test_ns", &database)
            .await
            .expect("failed to start in-memory surrealdb"),
    );

    db.apply_migrations().await.expect("failed to apply migrations");
    db.ensure_vector_index(TEST_DIMENSIONS as usize)
        .await
        .expect("failed to build vector index");

    db
}

pub fn test_config() -> AppConfig {
    AppConfig {
        chunk_max_tokens: 50,
        embedding_dimensions: TEST_DIMENSIONS,
        ..AppConfig::default()
    }
}

/// Full API state over an in-memory store, hashed embeddings and the
/// keyword extraction stand-in.
pub async fn setup_api_state() -> ApiState {
    let db = setup_test_database().await;
    let embedder = Arc::new(EmbeddingProvider::hashed(TEST_DIMENSIONS));
    ApiState::with_resources(db, embedder, Arc::new(KeywordLlm), test_config())
}

pub fn test_server(state: &ApiState) -> TestServer {
    let app = Router::new()
        .nest("/api/v1", api_routes_v1(state))
        .with_state(state.clone());

    TestServer::new(app).expect("failed to start test server")
}

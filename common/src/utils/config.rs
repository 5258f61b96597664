use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Selects the backend used for vector generation.
#[derive(Clone, Copy, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// OpenAI-compatible embeddings API (default).
    #[default]
    OpenAI,
    /// Deterministic hash-derived vectors. Development only; vectors are
    /// tagged with a model name that cannot collide with a real model.
    Hashed,
}

/// Selects the provider behind the answer-extraction LLM.
#[derive(Clone, Copy, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Claude,
    #[default]
    OpenAI,
}

/// Application configuration loaded from files and environment variables.
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    pub http_port: u16,
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub anthropic_base_url: Option<String>,
    #[serde(default)]
    pub llm_provider: LlmProvider,
    /// Provider-specific extraction model; each adaptor has its own default.
    #[serde(default)]
    pub llm_model: Option<String>,
    #[serde(default)]
    pub embedding_backend: EmbeddingBackend,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
    #[serde(default = "default_embedding_version")]
    pub embedding_version: u32,
    #[serde(default = "default_chunk_max_tokens")]
    pub chunk_max_tokens: usize,
    #[serde(default = "default_chunk_overlap_tokens")]
    pub chunk_overlap_tokens: usize,
    #[serde(default = "default_ingest_max_body_bytes")]
    pub ingest_max_body_bytes: usize,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

const fn default_embedding_dimensions() -> u32 {
    1536
}

const fn default_embedding_version() -> u32 {
    1
}

const fn default_chunk_max_tokens() -> usize {
    400
}

const fn default_chunk_overlap_tokens() -> usize {
    50
}

const fn default_ingest_max_body_bytes() -> usize {
    1024 * 1024 * 1024
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            surrealdb_address: String::new(),
            surrealdb_username: String::new(),
            surrealdb_password: String::new(),
            surrealdb_namespace: String::new(),
            surrealdb_database: String::new(),
            http_port: 0,
            openai_api_key: String::new(),
            openai_base_url: default_openai_base_url(),
            anthropic_api_key: None,
            anthropic_base_url: None,
            llm_provider: LlmProvider::default(),
            llm_model: None,
            embedding_backend: EmbeddingBackend::default(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: default_embedding_dimensions(),
            embedding_version: default_embedding_version(),
            chunk_max_tokens: default_chunk_max_tokens(),
            chunk_overlap_tokens: default_chunk_overlap_tokens(),
            ingest_max_body_bytes: default_ingest_max_body_bytes(),
        }
    }
}

/// Loads the application configuration from the environment and optional
/// config file.
#[allow(clippy::module_name_repetitions)]
pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

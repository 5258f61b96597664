use std::time::Duration;

use async_openai::{config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client};
use tokio::time::timeout;
use tracing::debug;

use crate::{
    error::AppError,
    utils::config::{AppConfig, EmbeddingBackend},
};

/// Model tag attached to hash-derived development vectors. Deliberately
/// unlike any real provider model name: retrieval filters on the active
/// model, so tagged mock vectors can never surface in production queries.
pub const MOCK_EMBEDDING_MODEL: &str = "mock-embedding-dev";

const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// Produces fixed-dimension dense vectors under a named model + version.
pub enum EmbeddingProvider {
    OpenAI {
        client: Client<OpenAIConfig>,
        model: String,
        dimensions: u32,
        version: u32,
    },
    /// Deterministic pseudo-embeddings for development environments where
    /// the upstream provider is unreachable.
    Hashed { dimensions: u32, version: u32 },
}

impl EmbeddingProvider {
    pub fn from_config(config: &AppConfig) -> Self {
        match config.embedding_backend {
            EmbeddingBackend::OpenAI => {
                let client = Client::with_config(
                    OpenAIConfig::new()
                        .with_api_key(&config.openai_api_key)
                        .with_api_base(&config.openai_base_url),
                );
                Self::OpenAI {
                    client,
                    model: config.embedding_model.clone(),
                    dimensions: config.embedding_dimensions,
                    version: config.embedding_version,
                }
            }
            EmbeddingBackend::Hashed => Self::Hashed {
                dimensions: config.embedding_dimensions,
                version: config.embedding_version,
            },
        }
    }

    pub fn hashed(dimensions: u32) -> Self {
        Self::Hashed {
            dimensions,
            version: 1,
        }
    }

    pub fn model_tag(&self) -> &str {
        match self {
            Self::OpenAI { model, .. } => model,
            Self::Hashed { .. } => MOCK_EMBEDDING_MODEL,
        }
    }

    pub const fn dimension(&self) -> u32 {
        match self {
            Self::OpenAI { dimensions, .. } | Self::Hashed { dimensions, .. } => *dimensions,
        }
    }

    pub const fn version(&self) -> u32 {
        match self {
            Self::OpenAI { version, .. } | Self::Hashed { version, .. } => *version,
        }
    }

    pub const fn is_mock(&self) -> bool {
        matches!(self, Self::Hashed { .. })
    }

    /// Generates an embedding vector for the given input text.
    ///
    /// Deterministic for a fixed `(model, version, text)` from the
    /// provider's perspective. Exceeding the 30 s deadline surfaces as a
    /// typed `Timeout`.
    pub async fn embed(&self, input: &str) -> Result<Vec<f32>, AppError> {
        match self {
            Self::OpenAI {
                client,
                model,
                dimensions,
                ..
            } => {
                let request = CreateEmbeddingRequestArgs::default()
                    .model(model)
                    .dimensions(*dimensions)
                    .input([input])
                    .build()
                    .map_err(|e| AppError::Embedding(e.to_string()))?;

                let response = timeout(EMBED_TIMEOUT, client.embeddings().create(request))
                    .await
                    .map_err(|_| {
                        AppError::Timeout(format!(
                            "embedding request exceeded {}s",
                            EMBED_TIMEOUT.as_secs()
                        ))
                    })?
                    .map_err(|e| AppError::Embedding(e.to_string()))?;

                let embedding: Vec<f32> = response
                    .data
                    .first()
                    .ok_or_else(|| AppError::Embedding("no embedding data received".into()))?
                    .embedding
                    .clone();

                if embedding.len() != *dimensions as usize {
                    return Err(AppError::Embedding(format!(
                        "provider returned {} dimensions, expected {dimensions}",
                        embedding.len()
                    )));
                }

                debug!(dimensions = embedding.len(), "embedding created");
                Ok(embedding)
            }
            Self::Hashed { dimensions, .. } => Ok(hashed_vector(input, *dimensions)),
        }
    }
}

/// Deterministic hash-derived vector. Not meaningful as a semantic
/// embedding; only keeps development environments running.
fn hashed_vector(text: &str, dimensions: u32) -> Vec<f32> {
    let mut hash: i64 = 0;
    for ch in text.chars() {
        hash = hash.wrapping_mul(31).wrapping_add(ch as i64);
    }

    (0..dimensions as usize)
        .map(|i| (hash.wrapping_add(i as i64).rem_euclid(1000)) as f32 / 1000.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_vectors_are_deterministic_and_sized() {
        let provider = EmbeddingProvider::hashed(16);
        let a = tokio_test_block_on(provider.embed("same input")).unwrap();
        let b = tokio_test_block_on(provider.embed("same input")).unwrap();
        let c = tokio_test_block_on(provider.embed("different input")).unwrap();

        assert_eq!(a.len(), 16);
        assert_eq!(a, b);
        assert_ne!(a, c);
        for value in &a {
            assert!((0.0..1.0).contains(value));
        }
    }

    #[test]
    fn mock_provider_uses_reserved_model_tag() {
        let provider = EmbeddingProvider::hashed(8);
        assert!(provider.is_mock());
        assert_eq!(provider.model_tag(), MOCK_EMBEDDING_MODEL);
        assert_eq!(provider.dimension(), 8);
        assert_eq!(provider.version(), 1);
    }

    #[test]
    fn openai_provider_reports_configured_identity() {
        let config = AppConfig {
            openai_api_key: "sk-test".into(),
            ..AppConfig::default()
        };
        let provider = EmbeddingProvider::from_config(&config);
        assert!(!provider.is_mock());
        assert_eq!(provider.model_tag(), "text-embedding-3-small");
        assert_eq!(provider.dimension(), 1536);
    }

    fn tokio_test_block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime")
            .block_on(future)
    }
}

pub mod answer_extraction;
pub mod hybrid;
pub mod llm;
pub mod scoring;

pub use answer_extraction::{
    qa_search, rank_answers_by_confidence, AnswerExtractor, AnswerResult, QaSearchResults,
    DEFAULT_ANSWER_LIMIT,
};
pub use hybrid::{collect_candidates, search, SearchResultEntry, SearchResults};
pub use llm::{client_from_config, LlmClient, LlmResponse};
pub use scoring::{RetrievalChannel, ScoredCandidate};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::{
        error::AppError,
        storage::{
            db::SurrealDbClient,
            types::{
                chunk::{Chunk, ChunkSpan},
                content_item::{ContentItem, ContentType},
            },
        },
        utils::embedding::EmbeddingProvider,
    };
    use std::collections::HashMap;
    use std::sync::Arc;
    use uuid::Uuid;

    const DIMENSIONS: u32 = 8;

    /// Keyword-matching stand-in for a real provider: confident when the
    /// chunk mentions the query's salient token.
    struct KeywordLlm;

    #[async_trait]
    impl LlmClient for KeywordLlm {
        async fn extract_answer(&self, _query: &str, chunk: &str) -> Result<LlmResponse, AppError> {
            if chunk.contains("Paris") {
                Ok(LlmResponse {
                    answer: "Paris".into(),
                    confidence: 0.9,
                    has_answer: true,
                    reasoning: "stated directly".into(),
                })
            } else {
                Ok(LlmResponse {
                    answer: String::new(),
                    confidence: 0.0,
                    has_answer: false,
                    reasoning: "not mentioned".into(),
                })
            }
        }
    }

    async fn seeded_db() -> (SurrealDbClient, EmbeddingProvider) {
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory("test_ns", &database)
            .await
            .expect("failed to start in-memory surrealdb");
        db.apply_migrations().await.expect("migrations");
        db.ensure_vector_index(DIMENSIONS as usize)
            .await
            .expect("vector index");
        (db, EmbeddingProvider::hashed(DIMENSIONS))
    }

    async fn store_document_chunk(
        db: &SurrealDbClient,
        embedder: &EmbeddingProvider,
        user_id: &str,
        title: &str,
        text: &str,
    ) {
        let item = ContentItem::new(
            user_id.to_string(),
            ContentType::Document,
            title.to_string(),
            format!("uploads/documents/{title}.txt"),
            text.len() as u64,
            HashMap::new(),
        );
        db.store_item(item.clone()).await.expect("store item");

        let chunk = Chunk::new(
            item.id.clone(),
            text.to_string(),
            0,
            text.split_whitespace().count() as u32,
            ChunkSpan::Document {
                page: 1,
                start_char: 0,
                end_char: text.chars().count() as u64,
            },
            user_id.to_string(),
        );
        let vector = embedder.embed(text).await.expect("embed");
        Chunk::store_with_embedding(chunk, vector, embedder.model_tag(), 1, db)
            .await
            .expect("store chunk");
    }

    #[tokio::test]
    async fn qa_search_extracts_and_ranks_answers() {
        let (db, embedder) = seeded_db().await;
        let user_id = "qa_user";

        store_document_chunk(
            &db,
            &embedder,
            user_id,
            "geography",
            "Paris is the capital of France and home to the Louvre.",
        )
        .await;
        store_document_chunk(
            &db,
            &embedder,
            user_id,
            "cooking",
            "Slow roasting vegetables concentrates their natural sweetness.",
        )
        .await;
        db.rebuild_indexes().await.expect("rebuild");

        let extractor = AnswerExtractor::new(Arc::new(KeywordLlm));
        let results = qa_search(
            &db,
            &embedder,
            &extractor,
            user_id,
            "What is the capital of France?",
            5,
        )
        .await
        .expect("qa search");

        assert_eq!(results.strategy, "qa-hybrid");
        assert_eq!(results.total, results.answers.len());
        assert!(!results.answers.is_empty());

        let top = &results.answers[0];
        assert!(top.answer.contains("Paris"));
        assert!(top.confidence >= 0.7);
        assert_eq!(top.content_type, ContentType::Document);
        assert_eq!(top.source_title, "geography");
        assert!(top.source_chunk.contains("Paris"));
    }

    #[tokio::test]
    async fn qa_search_returns_empty_answers_when_nothing_matches() {
        let (db, embedder) = seeded_db().await;
        let user_id = "qa_empty_user";

        store_document_chunk(
            &db,
            &embedder,
            user_id,
            "cooking",
            "Slow roasting vegetables concentrates their natural sweetness.",
        )
        .await;
        db.rebuild_indexes().await.expect("rebuild");

        let extractor = AnswerExtractor::new(Arc::new(KeywordLlm));
        let results = qa_search(
            &db,
            &embedder,
            &extractor,
            user_id,
            "What is the capital of France?",
            5,
        )
        .await
        .expect("qa search");

        assert_eq!(results.strategy, "qa-hybrid");
        assert!(results.answers.is_empty());
        assert_eq!(results.total, 0);
    }
}

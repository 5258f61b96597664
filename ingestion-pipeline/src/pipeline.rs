use std::{collections::HashMap, path::Path, sync::Arc};

use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    Retry,
};
use tracing::{info, info_span, warn, Instrument};

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{
            chunk::{Chunk, ChunkSpan},
            chunk_embedding::ChunkEmbedding,
            content_item::{ContentItem, ContentType},
            ingestion_task::IngestionTask,
        },
    },
    utils::{config::AppConfig, embedding::EmbeddingProvider, tokenizer::Tokenizer},
};

use crate::{
    chunking::{self, SpannedChunk},
    extract,
};

/// Drives ingestion: extraction and content-item creation in the request,
/// chunking + embedding + storage in a background task.
pub struct IngestionPipeline {
    db: Arc<SurrealDbClient>,
    embedder: Arc<EmbeddingProvider>,
    tokenizer: Tokenizer,
    config: AppConfig,
}

impl IngestionPipeline {
    pub fn new(
        db: Arc<SurrealDbClient>,
        embedder: Arc<EmbeddingProvider>,
        config: AppConfig,
    ) -> Self {
        Self {
            db,
            embedder,
            tokenizer: Tokenizer::new(),
            config,
        }
    }

    /// Synchronous half of ingestion. Extraction failures abort before any
    /// row is written; on success the content item row is persisted and the
    /// chunk+embed work is enqueued for the worker. The caller gets the
    /// content item back immediately.
    pub async fn ingest_document(
        &self,
        user_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<ContentItem, AppError> {
        if filename.trim().is_empty() {
            return Err(AppError::InvalidInput("missing file name".into()));
        }
        if bytes.is_empty() {
            return Err(AppError::InvalidInput("empty document payload".into()));
        }
        if bytes.len() > self.config.ingest_max_body_bytes {
            return Err(AppError::InvalidInput(format!(
                "document of {} bytes exceeds the {} byte limit",
                bytes.len(),
                self.config.ingest_max_body_bytes
            )));
        }

        let extracted = extract::extract_text(bytes, filename)?;
        let text = extracted.text();
        if text.is_empty() {
            return Err(AppError::EmptyContent);
        }

        let title = Path::new(filename)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(filename)
            .to_string();

        let mut source_metadata = HashMap::new();
        source_metadata.insert("filename".to_string(), filename.to_string());
        if let Some(extension) = Path::new(filename).extension().and_then(|e| e.to_str()) {
            source_metadata.insert("extension".to_string(), extension.to_ascii_lowercase());
        }

        let item = ContentItem::new(
            user_id.to_string(),
            ContentType::Document,
            title,
            format!("uploads/documents/{filename}"),
            bytes.len() as u64,
            source_metadata,
        );
        self.db.store_item(item.clone()).await?;

        let page_starts = chunking::page_start_offsets(&extracted.pages);
        IngestionTask::create_and_add_to_db(
            item.id.clone(),
            text,
            page_starts,
            user_id.to_string(),
            &self.db,
        )
        .await?;

        info!(
            content_id = %item.id,
            title = %item.title,
            file_size = item.file_size,
            "document accepted for ingestion"
        );

        Ok(item)
    }

    /// Worker half: claims the task, chunks and embeds its text, and
    /// records the outcome. Failed tasks are requeued until the attempt
    /// budget runs out.
    pub async fn process_task(&self, task: IngestionTask) -> Result<(), AppError> {
        let span = info_span!(
            "ingestion_task",
            task_id = %task.id,
            content_id = %task.content_item_id,
            attempt = task.attempts + 1
        );

        async {
            let processing = task.mark_processing(&self.db).await?;

            match self.process_content(&processing).await {
                Ok(persisted) => {
                    processing.mark_succeeded(&self.db).await?;
                    info!(chunks = persisted, "ingestion task succeeded");
                    Ok(())
                }
                Err(err) => {
                    let reason = err.to_string();
                    if processing.can_retry() {
                        processing.mark_retryable(&self.db).await?;
                        warn!(%reason, "ingestion task failed; requeued");
                    } else {
                        processing.mark_dead(reason.clone(), &self.db).await?;
                        warn!(%reason, "ingestion task failed; moved to dead letter");
                    }
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Chunks the extracted text and stores each chunk with its embedding.
    /// Per-chunk failures are logged with the chunk index and skipped; the
    /// document counts as ingested if at least one pair was persisted.
    async fn process_content(&self, task: &IngestionTask) -> Result<usize, AppError> {
        let chunks =
            chunking::chunk_text_with_spans(&self.tokenizer, &task.text, self.config.chunk_max_tokens);
        info!(chunk_count = chunks.len(), "text chunked");

        let mut persisted = 0usize;
        for (index, piece) in chunks.iter().enumerate() {
            match self.store_chunk(task, index as u32, piece).await {
                Ok(()) => persisted += 1,
                Err(err) => {
                    warn!(chunk_index = index, %err, "failed to persist chunk; skipping");
                }
            }
        }

        if persisted == 0 && !chunks.is_empty() {
            ContentItem::flag_ingest_status(&self.db, &task.content_item_id, "no_chunks").await?;
            return Err(AppError::Embedding(
                "no chunk embeddings could be persisted".into(),
            ));
        }

        self.db.rebuild_indexes().await?;

        // A document is only ready for retrieval once every persisted chunk
        // carries an embedding under the active model and version.
        let embedded = ChunkEmbedding::count_for_content_item(
            &self.db,
            &task.content_item_id,
            self.embedder.model_tag(),
            self.embedder.version(),
        )
        .await?;
        if embedded < persisted {
            return Err(AppError::Embedding(format!(
                "{persisted} chunks persisted but only {embedded} embeddings present"
            )));
        }

        info!(
            persisted,
            total = chunks.len(),
            "document ready for retrieval"
        );

        Ok(persisted)
    }

    async fn store_chunk(
        &self,
        task: &IngestionTask,
        index: u32,
        piece: &SpannedChunk,
    ) -> Result<(), AppError> {
        let token_count = self.tokenizer.count(&piece.text) as u32;
        let page = chunking::page_for_offset(&task.page_starts, piece.start_char);

        let retry_strategy = ExponentialBackoff::from_millis(100).map(jitter).take(3);
        let embedding =
            Retry::spawn(retry_strategy, || self.embedder.embed(&piece.text)).await?;

        if embedding.len() != self.embedder.dimension() as usize {
            return Err(AppError::Embedding(format!(
                "embedding for chunk {index} has dimension {}, expected {}",
                embedding.len(),
                self.embedder.dimension()
            )));
        }

        let chunk = Chunk::new(
            task.content_item_id.clone(),
            piece.text.clone(),
            index,
            token_count,
            ChunkSpan::Document {
                page,
                start_char: piece.start_char,
                end_char: piece.end_char,
            },
            task.user_id.clone(),
        );

        Chunk::store_with_embedding(
            chunk,
            embedding,
            self.embedder.model_tag(),
            self.embedder.version(),
            &self.db,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::types::chunk::ChunkSearchResult;
    use common::storage::types::ingestion_task::IngestionTaskStatus;
    use uuid::Uuid;

    const DIMENSIONS: u32 = 8;

    async fn test_pipeline() -> (Arc<SurrealDbClient>, IngestionPipeline) {
        let database = Uuid::new_v4().to_string();
        let db = Arc::new(
            SurrealDbClient::memory("test_ns", &database)
                .await
                .expect("failed to start in-memory surrealdb"),
        );
        db.apply_migrations().await.expect("migrations");
        db.ensure_vector_index(DIMENSIONS as usize)
            .await
            .expect("vector index");

        let embedder = Arc::new(EmbeddingProvider::hashed(DIMENSIONS));
        let config = AppConfig {
            chunk_max_tokens: 50,
            embedding_dimensions: DIMENSIONS,
            ..AppConfig::default()
        };

        let pipeline = IngestionPipeline::new(db.clone(), embedder, config);
        (db, pipeline)
    }

    #[tokio::test]
    async fn ingest_document_persists_item_and_enqueues_task() {
        let (db, pipeline) = test_pipeline().await;

        let item = pipeline
            .ingest_document("user_a", "capitals.txt", b"Paris is the capital of France.")
            .await
            .expect("ingest");

        assert_eq!(item.title, "capitals");
        assert_eq!(item.content_type, ContentType::Document);
        assert_eq!(item.file_size, 31);
        assert_eq!(
            item.source_metadata.get("filename").map(String::as_str),
            Some("capitals.txt")
        );

        let stored: Option<ContentItem> = db.get_item(&item.id).await.unwrap();
        assert!(stored.is_some());

        let tasks = IngestionTask::get_unfinished_tasks(&db)
            .await
            .expect("unfinished tasks");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].content_item_id, item.id);
        assert!(tasks[0].text.contains("Paris"));
    }

    #[tokio::test]
    async fn empty_payload_is_rejected_without_rows() {
        let (db, pipeline) = test_pipeline().await;

        let err = pipeline
            .ingest_document("user_a", "empty.txt", b"")
            .await
            .unwrap_err();
        assert_eq!(err.machine_tag(), "InvalidInput");

        let items: Vec<ContentItem> = db.get_all_stored_items().await.expect("items");
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn whitespace_only_document_is_empty_content() {
        let (db, pipeline) = test_pipeline().await;

        let err = pipeline
            .ingest_document("user_a", "blank.txt", b"   \n\t  ")
            .await
            .unwrap_err();
        assert_eq!(err.machine_tag(), "EmptyContent");

        let items: Vec<ContentItem> = db.get_all_stored_items().await.expect("items");
        assert!(items.is_empty(), "no content item row may be persisted");
    }

    #[tokio::test]
    async fn oversized_payload_is_invalid_input() {
        let (_db, pipeline) = {
            let (db, mut pipeline) = test_pipeline().await;
            pipeline.config.ingest_max_body_bytes = 16;
            (db, pipeline)
        };

        let err = pipeline
            .ingest_document("user_a", "big.txt", b"this payload is larger than sixteen bytes")
            .await
            .unwrap_err();
        assert_eq!(err.machine_tag(), "InvalidInput");
    }

    #[tokio::test]
    async fn process_task_stores_dense_chunks_with_embeddings() {
        let (db, pipeline) = test_pipeline().await;

        let sentence = "The quarterly budget ceiling is reviewed by the finance team every cycle. ";
        let body = sentence.repeat(20);
        let item = pipeline
            .ingest_document("user_a", "budget.txt", body.as_bytes())
            .await
            .expect("ingest");

        let tasks = IngestionTask::get_unfinished_tasks(&db).await.expect("tasks");
        pipeline
            .process_task(tasks.into_iter().next().expect("task"))
            .await
            .expect("process");

        let chunks = Chunk::get_for_content_item(&db, &item.id, "user_a")
            .await
            .expect("chunks");
        assert!(chunks.len() > 1, "expected multiple chunks");

        let tokenizer = Tokenizer::new();
        for (expected_index, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, expected_index as u32, "dense indices");
            assert_eq!(
                chunk.token_count as usize,
                tokenizer.count(&chunk.chunk_text),
                "token_count matches the tokenizer"
            );
            assert!(chunk.token_count as usize <= 50);
            match &chunk.chunk_span {
                ChunkSpan::Document { page, .. } => assert_eq!(*page, 1),
                other => panic!("expected document span, got {other:?}"),
            }
        }

        let task_rows: Vec<IngestionTask> = db.get_all_stored_items().await.expect("tasks");
        assert_eq!(task_rows.len(), 1);
        assert_eq!(task_rows[0].status, IngestionTaskStatus::Completed);
    }

    #[tokio::test]
    async fn processed_chunks_are_retrievable_by_vector_search() {
        let (db, pipeline) = test_pipeline().await;

        let item = pipeline
            .ingest_document("user_a", "paris.txt", b"Paris is the capital of France.")
            .await
            .expect("ingest");

        let tasks = IngestionTask::get_unfinished_tasks(&db).await.expect("tasks");
        pipeline
            .process_task(tasks.into_iter().next().expect("task"))
            .await
            .expect("process");

        let query_vector = pipeline
            .embedder
            .embed("What is the capital of France?")
            .await
            .expect("query embedding");

        let results: Vec<ChunkSearchResult> = Chunk::vector_search(
            5,
            query_vector,
            pipeline.embedder.model_tag(),
            &db,
            "user_a",
        )
        .await
        .expect("vector search");

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.content_item_id, item.id);
        assert!(results[0].chunk.chunk_text.contains("Paris"));
    }
}

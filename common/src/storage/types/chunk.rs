use uuid::Uuid;

use crate::storage::types::chunk_embedding::ChunkEmbedding;
use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

/// Structured locator describing where a chunk came from in its source.
/// The variant is data: retrieval and answer extraction only consult it to
/// format attribution.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChunkSpan {
    Document {
        page: u32,
        start_char: u64,
        end_char: u64,
    },
    Audio {
        start_time_s: f64,
        end_time_s: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speaker_id: Option<String>,
    },
    Web {
        section: String,
    },
}

stored_object!(Chunk, "chunk", {
    content_item_id: String,
    chunk_text: String,
    chunk_index: u32,
    token_count: u32,
    chunk_span: ChunkSpan,
    user_id: String
});

/// Search hit including the hydrated chunk.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct ChunkSearchResult {
    pub chunk: Chunk,
    pub score: f32,
}

impl Chunk {
    pub fn new(
        content_item_id: String,
        chunk_text: String,
        chunk_index: u32,
        token_count: u32,
        chunk_span: ChunkSpan,
        user_id: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            content_item_id,
            chunk_text,
            chunk_index,
            token_count,
            chunk_span,
            user_id,
        }
    }

    /// Stores a chunk and its embedding in a single transaction so a chunk
    /// is never visible to retrieval without its vector (and vice versa).
    pub async fn store_with_embedding(
        chunk: Chunk,
        vector: Vec<f32>,
        model: &str,
        version: u32,
        db: &SurrealDbClient,
    ) -> Result<(), AppError> {
        let chunk_id = chunk.id.clone();
        let emb = ChunkEmbedding::new(
            &chunk_id,
            chunk.content_item_id.clone(),
            model.to_owned(),
            version,
            vector,
            chunk.user_id.clone(),
        );

        let response = db
            .client
            .query("BEGIN TRANSACTION;")
            .query(format!(
                "CREATE type::thing('{chunk_table}', $chunk_id) CONTENT $chunk;",
                chunk_table = Self::table_name(),
            ))
            .query(format!(
                "CREATE type::thing('{emb_table}', $emb_id) CONTENT $emb;",
                emb_table = ChunkEmbedding::table_name(),
            ))
            .query("COMMIT TRANSACTION;")
            .bind(("chunk_id", chunk_id))
            .bind(("chunk", chunk))
            .bind(("emb_id", emb.id.clone()))
            .bind(("emb", emb))
            .await
            .map_err(AppError::Store)?;

        response.check().map_err(AppError::Store)?;

        Ok(())
    }

    /// KNN search over the embedding table, hydrating the owning chunks.
    /// Only embeddings produced under `model` participate, so development
    /// mock vectors never leak into production queries.
    pub async fn vector_search(
        take: usize,
        query_embedding: Vec<f32>,
        model: &str,
        db: &SurrealDbClient,
        user_id: &str,
    ) -> Result<Vec<ChunkSearchResult>, AppError> {
        #[derive(Deserialize)]
        struct Row {
            chunk_id: Chunk,
            score: f32,
        }

        let sql = format!(
            r#"
            SELECT
                chunk_id,
                vector::similarity::cosine(embedding, $embedding) AS score
            FROM {emb_table}
            WHERE user_id = $user_id
              AND embedding_model = $model
              AND embedding <|{take},100|> $embedding
            ORDER BY score DESC
            LIMIT {take}
            FETCH chunk_id;
            "#,
            emb_table = ChunkEmbedding::table_name(),
            take = take
        );

        let mut response = db
            .query(sql)
            .bind(("embedding", query_embedding))
            .bind(("model", model.to_owned()))
            .bind(("user_id", user_id.to_owned()))
            .await
            .map_err(AppError::Store)?;

        let rows: Vec<Row> = response.take::<Vec<Row>>(0).unwrap_or_default();

        Ok(rows
            .into_iter()
            .map(|r| ChunkSearchResult {
                chunk: r.chunk_id,
                score: r.score,
            })
            .collect())
    }

    /// Full-text search over chunk text using the BM25 index.
    pub async fn fts_search(
        take: usize,
        terms: &str,
        db: &SurrealDbClient,
        user_id: &str,
    ) -> Result<Vec<ChunkSearchResult>, AppError> {
        #[derive(Deserialize)]
        struct Row {
            #[serde(deserialize_with = "deserialize_flexible_id")]
            id: String,
            #[serde(deserialize_with = "deserialize_datetime")]
            created_at: DateTime<Utc>,
            #[serde(deserialize_with = "deserialize_datetime")]
            updated_at: DateTime<Utc>,
            content_item_id: String,
            chunk_text: String,
            chunk_index: u32,
            token_count: u32,
            chunk_span: ChunkSpan,
            user_id: String,
            score: f32,
        }

        let limit = i64::try_from(take).unwrap_or(i64::MAX);

        let sql = format!(
            r#"
            SELECT
                id,
                created_at,
                updated_at,
                content_item_id,
                chunk_text,
                chunk_index,
                token_count,
                chunk_span,
                user_id,
                IF search::score(0) != NONE THEN search::score(0) ELSE 0 END AS score
            FROM {chunk_table}
            WHERE chunk_text @0@ $terms
              AND user_id = $user_id
            ORDER BY score DESC
            LIMIT $limit;
            "#,
            chunk_table = Self::table_name(),
        );

        let mut response = db
            .query(sql)
            .bind(("terms", terms.to_owned()))
            .bind(("user_id", user_id.to_owned()))
            .bind(("limit", limit))
            .await
            .map_err(AppError::Store)?;

        let mut response = response.check().map_err(AppError::Store)?;
        let rows: Vec<Row> = response.take::<Vec<Row>>(0).map_err(AppError::Store)?;

        Ok(rows
            .into_iter()
            .map(|r| ChunkSearchResult {
                chunk: Chunk {
                    id: r.id,
                    created_at: r.created_at,
                    updated_at: r.updated_at,
                    content_item_id: r.content_item_id,
                    chunk_text: r.chunk_text,
                    chunk_index: r.chunk_index,
                    token_count: r.token_count,
                    chunk_span: r.chunk_span,
                    user_id: r.user_id,
                },
                score: r.score,
            })
            .collect())
    }

    /// All chunks of a content item in reading order.
    pub async fn get_for_content_item(
        db: &SurrealDbClient,
        content_item_id: &str,
        user_id: &str,
    ) -> Result<Vec<Self>, AppError> {
        let sql = format!(
            "SELECT * FROM {table} \
             WHERE content_item_id = $content_item_id AND user_id = $user_id \
             ORDER BY chunk_index ASC",
            table = Self::table_name(),
        );

        let mut response = db
            .query(sql)
            .bind(("content_item_id", content_item_id.to_owned()))
            .bind(("user_id", user_id.to_owned()))
            .await?;

        let chunks: Vec<Self> = response.take(0)?;
        Ok(chunks)
    }
}

use surrealdb::RecordId;

use crate::storage::types::chunk::Chunk;
use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(ChunkEmbedding, "chunk_embedding", {
    /// Record link to the owning chunk
    chunk_id: RecordId,
    /// Denormalized content item id for bulk deletes
    content_item_id: String,
    embedding_model: String,
    embedding_dim: u32,
    embedding: Vec<f32>,
    embedding_version: u32,
    /// Denormalized user id for scoping
    user_id: String
});

impl ChunkEmbedding {
    /// `chunk_key` is the key part of the chunk id (the UUID), not
    /// "chunk:uuid". The dimension is derived from the vector itself so
    /// `len(embedding) == embedding_dim` holds by construction.
    pub fn new(
        chunk_key: &str,
        content_item_id: String,
        embedding_model: String,
        embedding_version: u32,
        embedding: Vec<f32>,
        user_id: String,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            chunk_id: RecordId::from_table_key(Chunk::table_name(), chunk_key),
            content_item_id,
            embedding_model,
            embedding_dim: embedding.len() as u32,
            embedding,
            embedding_version,
            user_id,
        }
    }

    pub async fn get_by_chunk_id(
        chunk_id: &RecordId,
        db: &SurrealDbClient,
    ) -> Result<Option<Self>, AppError> {
        let query = format!(
            "SELECT * FROM {} WHERE chunk_id = $chunk_id LIMIT 1",
            Self::table_name()
        );

        let mut result = db
            .client
            .query(query)
            .bind(("chunk_id", chunk_id.clone()))
            .await
            .map_err(AppError::Store)?;

        let embeddings: Vec<Self> = result.take(0).map_err(AppError::Store)?;

        Ok(embeddings.into_iter().next())
    }

    /// Counts chunks of a content item that carry an embedding under the
    /// given model and version. Used to decide whether a document is ready
    /// for retrieval.
    pub async fn count_for_content_item(
        db: &SurrealDbClient,
        content_item_id: &str,
        model: &str,
        version: u32,
    ) -> Result<usize, AppError> {
        #[derive(Deserialize)]
        struct CountRow {
            total: i64,
        }

        let query = format!(
            "SELECT count() AS total FROM {} \
             WHERE content_item_id = $content_item_id \
               AND embedding_model = $model \
               AND embedding_version = $version \
             GROUP ALL",
            Self::table_name()
        );

        let mut result = db
            .client
            .query(query)
            .bind(("content_item_id", content_item_id.to_owned()))
            .bind(("model", model.to_owned()))
            .bind(("version", version as i64))
            .await
            .map_err(AppError::Store)?;

        let rows: Vec<CountRow> = result.take(0).map_err(AppError::Store)?;
        Ok(rows.first().map_or(0, |r| r.total.max(0) as usize))
    }
}

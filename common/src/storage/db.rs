use crate::error::AppError;

use super::types::StoredObject;
use futures::Stream;
use std::{ops::Deref, sync::Arc};
use surrealdb::{
    engine::any::{connect, Any},
    opt::auth::Root,
    Error, Notification, Surreal,
};
use tracing::warn;

/// Name of the analyzer backing the BM25 full-text indexes.
const FTS_ANALYZER: &str = "app_en_fts_analyzer";

#[derive(Clone)]
pub struct SurrealDbClient {
    pub client: Surreal<Any>,
}

pub trait ProvidesDb {
    fn db(&self) -> &Arc<SurrealDbClient>;
}

impl SurrealDbClient {
    pub async fn new(
        address: &str,
        username: &str,
        password: &str,
        namespace: &str,
        database: &str,
    ) -> Result<Self, Error> {
        let db = connect(address).await?;

        db.signin(Root { username, password }).await?;
        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }

    /// Applies schema migrations: analyzers, lexical + uniqueness indexes
    /// and the cascade-delete events that keep the
    /// `content_item -> chunk -> chunk_embedding` tree consistent.
    ///
    /// The HNSW vector index depends on the configured embedding dimension
    /// and is created separately via [`Self::ensure_vector_index`].
    pub async fn apply_migrations(&self) -> Result<(), AppError> {
        self.define_fts_analyzer().await?;

        self.client
            .query(
                "DEFINE INDEX IF NOT EXISTS idx_content_item_user ON TABLE content_item FIELDS user_id;
                 DEFINE INDEX IF NOT EXISTS idx_chunk_user ON TABLE chunk FIELDS user_id;
                 DEFINE INDEX IF NOT EXISTS idx_chunk_content_item ON TABLE chunk FIELDS content_item_id;
                 DEFINE INDEX IF NOT EXISTS idx_chunk_position ON TABLE chunk FIELDS content_item_id, chunk_index UNIQUE;
                 DEFINE INDEX IF NOT EXISTS idx_embedding_user ON TABLE chunk_embedding FIELDS user_id;
                 DEFINE INDEX IF NOT EXISTS idx_embedding_identity ON TABLE chunk_embedding FIELDS chunk_id, embedding_model, embedding_version UNIQUE;
                 DEFINE INDEX IF NOT EXISTS idx_job_status ON TABLE job FIELDS status;
                 DEFINE INDEX IF NOT EXISTS idx_job_user ON TABLE job FIELDS user_id;",
            )
            .await?
            .check()?;

        // Deleting a content item removes its chunks, deleting a chunk
        // removes its embeddings. Cascades live in the store so they hold
        // under concurrent deletions.
        self.client
            .query(
                "DEFINE EVENT IF NOT EXISTS content_item_cascade ON TABLE content_item \
                     WHEN $event = \"DELETE\" \
                     THEN (DELETE chunk WHERE content_item_id = record::id($before.id));
                 DEFINE EVENT IF NOT EXISTS chunk_cascade ON TABLE chunk \
                     WHEN $event = \"DELETE\" \
                     THEN (DELETE chunk_embedding WHERE chunk_id = $before.id);",
            )
            .await?
            .check()?;

        Ok(())
    }

    /// Defines the English FTS analyzer and the BM25 index over chunk text.
    /// Falls back to an ascii-only analyzer when the snowball filter is not
    /// compiled into the engine.
    async fn define_fts_analyzer(&self) -> Result<(), AppError> {
        let snowball_sql = format!(
            "DEFINE ANALYZER IF NOT EXISTS {FTS_ANALYZER} TOKENIZERS class, punct FILTERS lowercase, ascii, snowball(english);
             DEFINE INDEX IF NOT EXISTS chunk_fts_text_idx ON TABLE chunk FIELDS chunk_text SEARCH ANALYZER {FTS_ANALYZER} BM25;"
        );

        if let Err(err) = self.client.query(snowball_sql).await {
            warn!(%err, "snowball analyzer unavailable, falling back to ascii");
            let fallback_sql = format!(
                "DEFINE ANALYZER OVERWRITE {FTS_ANALYZER} TOKENIZERS class, punct FILTERS lowercase, ascii;
                 DEFINE INDEX IF NOT EXISTS chunk_fts_text_idx ON TABLE chunk FIELDS chunk_text SEARCH ANALYZER {FTS_ANALYZER} BM25;"
            );
            self.client.query(fallback_sql).await?.check()?;
        }

        Ok(())
    }

    /// Creates the HNSW cosine index over `chunk_embedding.embedding` with
    /// the given dimension. Surreal requires the index definition to be
    /// recreated when the embedding length changes.
    pub async fn ensure_vector_index(&self, dimension: usize) -> Result<(), AppError> {
        let query = format!(
            "DEFINE INDEX IF NOT EXISTS idx_embedding_chunk_embedding ON TABLE chunk_embedding \
             FIELDS embedding HNSW DIMENSION {dimension} DIST COSINE TYPE F32 EFC 100 M 8;"
        );

        self.client.query(query).await?.check()?;
        Ok(())
    }

    pub async fn rebuild_indexes(&self) -> Result<(), AppError> {
        self.client
            .query("REBUILD INDEX IF EXISTS chunk_fts_text_idx ON chunk")
            .await?;
        self.client
            .query("REBUILD INDEX IF EXISTS idx_embedding_chunk_embedding ON chunk_embedding")
            .await?;
        Ok(())
    }

    /// Stores an object in its table, requires the struct to implement
    /// `StoredObject`.
    pub async fn store_item<T>(&self, item: T) -> Result<Option<T>, Error>
    where
        T: StoredObject + Send + Sync + 'static,
    {
        self.client
            .create((T::table_name(), item.get_id()))
            .content(item)
            .await
    }

    pub async fn get_all_stored_items<T>(&self) -> Result<Vec<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.select(T::table_name()).await
    }

    pub async fn get_item<T>(&self, id: &str) -> Result<Option<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.select((T::table_name(), id)).await
    }

    pub async fn delete_item<T>(&self, id: &str) -> Result<Option<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.delete((T::table_name(), id)).await
    }

    /// Live stream of notifications for a table.
    pub async fn listen<T>(
        &self,
    ) -> Result<impl Stream<Item = Result<Notification<T>, Error>>, Error>
    where
        T: for<'de> StoredObject + std::marker::Unpin,
    {
        self.client.select(T::table_name()).live().await
    }
}

impl Deref for SurrealDbClient {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl SurrealDbClient {
    /// Create an in-memory SurrealDB client for testing.
    pub async fn memory(namespace: &str, database: &str) -> Result<Self, Error> {
        let db = connect("mem://").await?;

        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }
}

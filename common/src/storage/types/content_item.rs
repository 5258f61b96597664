use std::collections::HashMap;

use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

/// Closed set of recognized content types. Ingestion only produces
/// `Document`; the remaining variants are schema-reserved for other
/// modalities that share the same chunk/answer shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Document,
    Audio,
    Video,
    Image,
    Webpage,
    Email,
}

impl ContentType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Image => "image",
            Self::Webpage => "webpage",
            Self::Email => "email",
        }
    }

    /// Parses a recognized content type; unknown values are a validation
    /// error rather than a silent default.
    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "document" => Ok(Self::Document),
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            "image" => Ok(Self::Image),
            "webpage" => Ok(Self::Webpage),
            "email" => Ok(Self::Email),
            other => Err(AppError::InvalidInput(format!(
                "unknown content type '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

stored_object!(ContentItem, "content_item", {
    user_id: String,
    content_type: ContentType,
    title: String,
    file_path: String,
    file_size: u64,
    language: String,
    source_metadata: HashMap<String, String>
});

impl ContentItem {
    pub fn new(
        user_id: String,
        content_type: ContentType,
        title: String,
        file_path: String,
        file_size: u64,
        source_metadata: HashMap<String, String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            user_id,
            content_type,
            title,
            file_path,
            file_size,
            language: "en".to_string(),
            source_metadata,
        }
    }

    /// Lists a user's content items, newest first, optionally filtered by
    /// content type.
    pub async fn get_for_user(
        db: &SurrealDbClient,
        user_id: &str,
        content_type: Option<ContentType>,
        limit: usize,
    ) -> Result<Vec<Self>, AppError> {
        let filter_clause = if content_type.is_some() {
            "AND content_type = $content_type"
        } else {
            ""
        };

        let sql = format!(
            "SELECT * FROM {table} WHERE user_id = $user_id {filter_clause} \
             ORDER BY created_at DESC LIMIT $limit",
            table = Self::table_name(),
        );

        let mut query = db
            .query(sql)
            .bind(("user_id", user_id.to_owned()))
            .bind(("limit", limit as i64));
        if let Some(ct) = content_type {
            query = query.bind(("content_type", ct.as_str().to_owned()));
        }

        let mut response = query.await?;
        let items: Vec<Self> = response.take(0)?;
        Ok(items)
    }

    /// Fetches a content item only if it is owned by `user_id`.
    pub async fn get_owned(
        db: &SurrealDbClient,
        id: &str,
        user_id: &str,
    ) -> Result<Option<Self>, AppError> {
        let item: Option<Self> = db.get_item(id).await?;
        Ok(item.filter(|item| item.user_id == user_id))
    }

    /// Records an ingestion status marker in `source_metadata`; used when
    /// chunking persisted no chunks so the item can be surfaced as broken.
    pub async fn flag_ingest_status(
        db: &SurrealDbClient,
        id: &str,
        status: &str,
    ) -> Result<(), AppError> {
        db.client
            .query(format!(
                "UPDATE type::thing('{table}', $id) SET \
                 source_metadata.ingest_status = $status, updated_at = time::now()",
                table = Self::table_name(),
            ))
            .bind(("id", id.to_owned()))
            .bind(("status", status.to_owned()))
            .await?
            .check()?;
        Ok(())
    }
}

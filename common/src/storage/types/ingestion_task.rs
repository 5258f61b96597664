use futures::Stream;
use surrealdb::{opt::PatchOp, Notification};
use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum IngestionTaskStatus {
    Created,
    InProgress,
    Completed,
    Error(String),
    Cancelled,
}

impl IngestionTaskStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::InProgress => "InProgress",
            Self::Completed => "Completed",
            Self::Error(_) => "Error",
            Self::Cancelled => "Cancelled",
        }
    }
}

stored_object!(IngestionTask, "job", {
    /// The content item this task will chunk and embed
    content_item_id: String,
    /// Extracted text, carried so the worker does not re-extract
    text: String,
    /// Char offsets (into the normalized text) where each source page starts
    page_starts: Vec<u64>,
    attempts: u32,
    status: IngestionTaskStatus,
    user_id: String
});

pub const MAX_ATTEMPTS: u32 = 3;

impl IngestionTask {
    pub fn new(
        content_item_id: String,
        text: String,
        page_starts: Vec<u64>,
        user_id: String,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            content_item_id,
            text,
            page_starts,
            attempts: 0,
            status: IngestionTaskStatus::Created,
            user_id,
        }
    }

    pub async fn create_and_add_to_db(
        content_item_id: String,
        text: String,
        page_starts: Vec<u64>,
        user_id: String,
        db: &SurrealDbClient,
    ) -> Result<Self, AppError> {
        let task = Self::new(content_item_id, text, page_starts, user_id);
        db.store_item(task.clone()).await?;
        Ok(task)
    }

    async fn patch_state(
        id: &str,
        status: IngestionTaskStatus,
        attempts: u32,
        db: &SurrealDbClient,
    ) -> Result<(), AppError> {
        let _task: Option<Self> = db
            .update((Self::table_name(), id))
            .patch(PatchOp::replace("/status", status))
            .patch(PatchOp::replace("/attempts", attempts))
            .patch(PatchOp::replace(
                "/updated_at",
                surrealdb::sql::Datetime::default(),
            ))
            .await?;

        Ok(())
    }

    /// Claims the task for a processing attempt.
    pub async fn mark_processing(mut self, db: &SurrealDbClient) -> Result<Self, AppError> {
        self.attempts += 1;
        self.status = IngestionTaskStatus::InProgress;
        Self::patch_state(&self.id, self.status.clone(), self.attempts, db).await?;
        Ok(self)
    }

    pub async fn mark_succeeded(&self, db: &SurrealDbClient) -> Result<(), AppError> {
        Self::patch_state(&self.id, IngestionTaskStatus::Completed, self.attempts, db).await
    }

    /// Requeues the task for another attempt.
    pub async fn mark_retryable(&self, db: &SurrealDbClient) -> Result<(), AppError> {
        Self::patch_state(&self.id, IngestionTaskStatus::Created, self.attempts, db).await
    }

    /// Terminal failure after the attempt budget is exhausted.
    pub async fn mark_dead(&self, reason: String, db: &SurrealDbClient) -> Result<(), AppError> {
        Self::patch_state(&self.id, IngestionTaskStatus::Error(reason), self.attempts, db).await
    }

    pub const fn can_retry(&self) -> bool {
        self.attempts < MAX_ATTEMPTS
    }

    pub async fn listen_for_tasks(
        db: &SurrealDbClient,
    ) -> Result<impl Stream<Item = Result<Notification<Self>, surrealdb::Error>>, surrealdb::Error>
    {
        db.listen::<Self>().await
    }

    /// Tasks that still need work: freshly created ones plus in-progress
    /// tasks abandoned by a previous worker, oldest first.
    pub async fn get_unfinished_tasks(db: &SurrealDbClient) -> Result<Vec<Self>, AppError> {
        let tasks: Vec<Self> = db
            .query(
                "SELECT * FROM type::table($table) \
                 WHERE status = 'Created' \
                    OR (status = 'InProgress' AND attempts < $max_attempts) \
                 ORDER BY created_at ASC",
            )
            .bind(("table", Self::table_name()))
            .bind(("max_attempts", MAX_ATTEMPTS))
            .await?
            .take(0)?;

        Ok(tasks)
    }
}

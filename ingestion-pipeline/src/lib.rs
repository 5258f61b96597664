pub mod chunking;
pub mod extract;
pub mod pipeline;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use surrealdb::Action;
use tracing::{error, info};

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::ingestion_task::{IngestionTask, IngestionTaskStatus},
    },
};
use pipeline::IngestionPipeline;

/// Delay before re-running a requeued task, growing with the attempt count.
fn retry_delay(attempt: u32) -> Duration {
    const BASE_SECONDS: u64 = 30;
    const MAX_SECONDS: u64 = 15 * 60;

    let capped_attempt = attempt.saturating_sub(1).min(5);
    let delay = BASE_SECONDS * 2_u64.pow(capped_attempt);

    Duration::from_secs(delay.min(MAX_SECONDS))
}

/// Worker loop: drains tasks left over from a previous run, then follows
/// the live stream of newly created tasks. The loop's lifetime is tied to
/// the process, not to any request.
pub async fn run_worker_loop(
    db: Arc<SurrealDbClient>,
    ingestion_pipeline: Arc<IngestionPipeline>,
) -> Result<(), AppError> {
    loop {
        let unfinished_tasks = IngestionTask::get_unfinished_tasks(&db).await?;
        if !unfinished_tasks.is_empty() {
            info!("Found {} unfinished ingestion tasks", unfinished_tasks.len());
            for task in unfinished_tasks {
                if let Err(e) = ingestion_pipeline.process_task(task).await {
                    error!("Error processing task: {e}");
                }
            }
        }

        info!("Listening for new ingestion tasks...");
        let mut task_stream = IngestionTask::listen_for_tasks(&db).await?;
        while let Some(notification) = task_stream.next().await {
            match notification {
                Ok(notification) => match notification.action {
                    Action::Create => {
                        if let Err(e) = ingestion_pipeline.process_task(notification.data).await {
                            error!("Error processing task: {e}");
                        }
                    }
                    Action::Update => {
                        // Requeued retries come back as status updates.
                        let task = notification.data;
                        if task.status == IngestionTaskStatus::Created {
                            tokio::time::sleep(retry_delay(task.attempts)).await;
                            if let Err(e) = ingestion_pipeline.process_task(task).await {
                                error!("Error processing task retry: {e}");
                            }
                        }
                    }
                    _ => {}
                },
                Err(e) => error!("Error in task notification: {e}"),
            }
        }

        error!("Database stream ended unexpectedly, reconnecting...");
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

//! Append-only task timeline. Ordering is by the `seq` sequence, not wall
//! clocks, so entries recorded by different workers never interleave
//! ambiguously. No update or delete statements exist for this table.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{TaskStatus, TimelineEntry};

pub async fn append(
    pool: &PgPool,
    task_id: Uuid,
    status: TaskStatus,
    detail: Option<&serde_json::Value>,
) -> Result<TimelineEntry, sqlx::Error> {
    sqlx::query_as::<_, TimelineEntry>(
        "INSERT INTO task_timeline (task_id, status, detail)
         VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(task_id)
    .bind(status.as_str())
    .bind(detail)
    .fetch_one(pool)
    .await
}

pub async fn list_by_task(pool: &PgPool, task_id: Uuid) -> Result<Vec<TimelineEntry>, sqlx::Error> {
    sqlx::query_as::<_, TimelineEntry>(
        "SELECT * FROM task_timeline WHERE task_id = $1 ORDER BY seq ASC",
    )
    .bind(task_id)
    .fetch_all(pool)
    .await
}

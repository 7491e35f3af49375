//! Application state tracker: the authoritative status + timeline for every
//! task. Status changes and timeline appends happen in one transaction, and
//! every change is validated against the task state machine.

use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::db;
use crate::models::{ApplicationTask, FailureKind, TaskStatus};

#[derive(Debug)]
pub enum TrackerError {
    NotFound(Uuid),
    IllegalTransition { from: String, to: TaskStatus },
    Database(sqlx::Error),
}

impl std::fmt::Display for TrackerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackerError::NotFound(id) => write!(f, "task {id} not found"),
            TrackerError::IllegalTransition { from, to } => {
                write!(f, "illegal transition {from} -> {to}")
            }
            TrackerError::Database(e) => write!(f, "database error: {e}"),
        }
    }
}

impl From<sqlx::Error> for TrackerError {
    fn from(e: sqlx::Error) -> Self {
        TrackerError::Database(e)
    }
}

/// Record a status change and its timeline entry atomically.
///
/// Terminal success clears the structured error; a lease only survives while
/// the task is in progress.
pub async fn record(
    pool: &PgPool,
    task_id: Uuid,
    to: TaskStatus,
    detail: Option<serde_json::Value>,
) -> Result<ApplicationTask, TrackerError> {
    let mut tx = pool.begin().await?;

    let current =
        sqlx::query_scalar::<_, String>("SELECT status FROM tasks WHERE id = $1 FOR UPDATE")
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(TrackerError::NotFound(task_id))?;

    check_transition(&current, to)?;

    let task = if to == TaskStatus::Submitted {
        sqlx::query_as::<_, ApplicationTask>(
            "UPDATE tasks
             SET status = $2, lease_expires_at = NULL,
                 last_error_kind = NULL, last_error_message = NULL,
                 last_error_screenshot = NULL, updated_at = now()
             WHERE id = $1 RETURNING *",
        )
        .bind(task_id)
        .bind(to.as_str())
        .fetch_one(&mut *tx)
        .await?
    } else {
        sqlx::query_as::<_, ApplicationTask>(
            "UPDATE tasks
             SET status = $2, lease_expires_at = NULL, updated_at = now()
             WHERE id = $1 RETURNING *",
        )
        .bind(task_id)
        .bind(to.as_str())
        .fetch_one(&mut *tx)
        .await?
    };

    append_timeline(&mut tx, task_id, to, detail.as_ref()).await?;

    tx.commit().await?;
    Ok(task)
}

/// Record a failed attempt: structured error, optional attempt-counter
/// increment (rate-limit delays and manual-review giveups do not consume an
/// attempt slot), status change, and timeline entry, all atomically.
pub async fn record_failure(
    pool: &PgPool,
    task_id: Uuid,
    to: TaskStatus,
    kind: FailureKind,
    message: &str,
    screenshot: Option<&str>,
    consume_attempt: bool,
) -> Result<ApplicationTask, TrackerError> {
    let mut tx = pool.begin().await?;

    let current =
        sqlx::query_scalar::<_, String>("SELECT status FROM tasks WHERE id = $1 FOR UPDATE")
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(TrackerError::NotFound(task_id))?;

    check_transition(&current, to)?;

    let increment = if consume_attempt { 1 } else { 0 };
    let task = sqlx::query_as::<_, ApplicationTask>(
        "UPDATE tasks
         SET status = $2,
             attempt_count = attempt_count + $3,
             last_error_kind = $4,
             last_error_message = $5,
             last_error_screenshot = $6,
             lease_expires_at = NULL,
             updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(task_id)
    .bind(to.as_str())
    .bind(increment)
    .bind(kind.as_str())
    .bind(message)
    .bind(screenshot)
    .fetch_one(&mut *tx)
    .await?;

    let detail = json!({
        "kind": kind.as_str(),
        "message": message,
        "screenshot": screenshot,
        "attempt": task.attempt_count,
    });
    append_timeline(&mut tx, task_id, to, Some(&detail)).await?;

    tx.commit().await?;
    Ok(task)
}

/// Record a retryable failure and put the task back in the queue in one
/// transaction: structured error, attempt increment, backoff delay, and both
/// timeline entries (`retrying`, then `queued`) commit together. A crash can
/// only ever leave the row fully before or fully after the retry, never
/// stranded in `retrying`. `next_eligible_at` only ever moves forward.
pub async fn record_retry(
    pool: &PgPool,
    task_id: Uuid,
    kind: FailureKind,
    message: &str,
    screenshot: Option<&str>,
    delay: Duration,
) -> Result<ApplicationTask, TrackerError> {
    let mut tx = pool.begin().await?;

    let current =
        sqlx::query_scalar::<_, String>("SELECT status FROM tasks WHERE id = $1 FOR UPDATE")
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(TrackerError::NotFound(task_id))?;

    check_transition(&current, TaskStatus::Retrying)?;

    let task = sqlx::query_as::<_, ApplicationTask>(
        "UPDATE tasks
         SET status = 'queued',
             attempt_count = attempt_count + 1,
             last_error_kind = $2,
             last_error_message = $3,
             last_error_screenshot = $4,
             lease_expires_at = NULL,
             next_eligible_at = GREATEST(next_eligible_at,
                                         now() + make_interval(secs => $5::double precision)),
             updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(task_id)
    .bind(kind.as_str())
    .bind(message)
    .bind(screenshot)
    .bind(delay.as_secs_f64())
    .fetch_one(&mut *tx)
    .await?;

    let retry_detail = json!({
        "kind": kind.as_str(),
        "message": message,
        "screenshot": screenshot,
        "attempt": task.attempt_count,
    });
    append_timeline(&mut tx, task_id, TaskStatus::Retrying, Some(&retry_detail)).await?;

    let queued_detail = json!({ "next_eligible_at": task.next_eligible_at });
    append_timeline(&mut tx, task_id, TaskStatus::Queued, Some(&queued_detail)).await?;

    tx.commit().await?;
    Ok(task)
}

fn check_transition(current: &str, to: TaskStatus) -> Result<(), TrackerError> {
    let from = TaskStatus::parse(current).ok_or_else(|| TrackerError::IllegalTransition {
        from: current.to_string(),
        to,
    })?;
    if !from.can_transition(to) {
        return Err(TrackerError::IllegalTransition {
            from: current.to_string(),
            to,
        });
    }
    Ok(())
}

async fn append_timeline(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    task_id: Uuid,
    status: TaskStatus,
    detail: Option<&serde_json::Value>,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO task_timeline (task_id, status, detail) VALUES ($1, $2, $3)")
        .bind(task_id)
        .bind(status.as_str())
        .bind(detail)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

// ── Reporting ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct LastError {
    pub task_id: Uuid,
    pub job_id: String,
    pub kind: String,
    pub message: Option<String>,
    pub screenshot: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AutoApplyStatus {
    pub active: bool,
    pub queued_count: i64,
    pub in_progress_count: i64,
    pub submitted_today: i64,
    pub last_error: Option<LastError>,
}

pub async fn status_summary(pool: &PgPool, user_id: Uuid) -> Result<AutoApplyStatus, sqlx::Error> {
    let counts = db::tasks::status_summary(pool, user_id).await?;
    let active = db::control::is_active(pool, user_id).await?;
    let last_error = db::tasks::last_error(pool, user_id).await?.map(|task| LastError {
        task_id: task.id,
        job_id: task.job_id,
        kind: task.last_error_kind.unwrap_or_default(),
        message: task.last_error_message,
        screenshot: task.last_error_screenshot,
    });

    Ok(AutoApplyStatus {
        active,
        queued_count: counts.queued_count,
        in_progress_count: counts.in_progress_count,
        submitted_today: counts.submitted_today,
        last_error,
    })
}

//! Task queue persistence. The `tasks` table doubles as the durable job
//! queue: claiming uses `FOR UPDATE SKIP LOCKED` so concurrent workers never
//! execute the same task, and a lease timestamp makes crashed claims
//! recoverable.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ApplicationTask, Platform};

pub struct NewTask<'a> {
    pub user_id: Uuid,
    pub job_id: &'a str,
    pub resume_id: &'a str,
    pub platform: Platform,
    pub max_attempts: i32,
    pub job_snapshot: &'a serde_json::Value,
    pub resume_snapshot: &'a serde_json::Value,
}

/// Idempotent enqueue: returns `None` when a live task already exists for
/// this (user, job) pair (the partial unique index absorbs the insert).
pub async fn create(
    pool: &PgPool,
    new: NewTask<'_>,
) -> Result<Option<ApplicationTask>, sqlx::Error> {
    sqlx::query_as::<_, ApplicationTask>(
        "INSERT INTO tasks (user_id, job_id, resume_id, platform, max_attempts,
                            job_snapshot, resume_snapshot)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (user_id, job_id)
             WHERE status NOT IN ('withdrawn', 'failed_permanent')
             DO NOTHING
         RETURNING *",
    )
    .bind(new.user_id)
    .bind(new.job_id)
    .bind(new.resume_id)
    .bind(new.platform.as_str())
    .bind(new.max_attempts)
    .bind(new.job_snapshot)
    .bind(new.resume_snapshot)
    .fetch_optional(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<ApplicationTask>, sqlx::Error> {
    sqlx::query_as::<_, ApplicationTask>("SELECT * FROM tasks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Atomically claim up to `max_batch` eligible tasks for one platform.
/// FIFO within the partition, gated on `next_eligible_at`; never blocks.
pub async fn claim_batch(
    pool: &PgPool,
    platform: Platform,
    max_batch: i64,
    lease_secs: f64,
) -> Result<Vec<ApplicationTask>, sqlx::Error> {
    sqlx::query_as::<_, ApplicationTask>(
        "UPDATE tasks
         SET status = 'in_progress',
             lease_expires_at = now() + make_interval(secs => $3::double precision),
             updated_at = now()
         WHERE id IN (
             SELECT id FROM tasks
             WHERE status = 'queued'
               AND platform = $1
               AND next_eligible_at <= now()
             ORDER BY next_eligible_at ASC, created_at ASC
             LIMIT $2
             FOR UPDATE SKIP LOCKED
         )
         RETURNING *",
    )
    .bind(platform.as_str())
    .bind(max_batch)
    .bind(lease_secs)
    .fetch_all(pool)
    .await
}

/// Return a claimed-but-unexecuted task to the queue (rate-limiter denial).
/// The attempt counter is untouched; `next_eligible_at` only ever moves
/// forward.
pub async fn release(pool: &PgPool, id: Uuid, delay_secs: f64) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE tasks
         SET status = 'queued',
             lease_expires_at = NULL,
             next_eligible_at = GREATEST(next_eligible_at,
                                         now() + make_interval(secs => $2::double precision)),
             updated_at = now()
         WHERE id = $1 AND status = 'in_progress'",
    )
    .bind(id)
    .bind(delay_secs)
    .execute(pool)
    .await?;
    Ok(())
}

/// Withdraw a still-pending task. Returns `None` when the task is not in a
/// withdrawable state (in-flight automation is not interruptible mid-step).
pub async fn withdraw(pool: &PgPool, id: Uuid) -> Result<Option<ApplicationTask>, sqlx::Error> {
    sqlx::query_as::<_, ApplicationTask>(
        "UPDATE tasks
         SET status = 'withdrawn', lease_expires_at = NULL, updated_at = now()
         WHERE id = $1 AND status IN ('queued', 'retrying')
         RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn withdraw_all_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<ApplicationTask>, sqlx::Error> {
    sqlx::query_as::<_, ApplicationTask>(
        "UPDATE tasks
         SET status = 'withdrawn', lease_expires_at = NULL, updated_at = now()
         WHERE user_id = $1 AND status IN ('queued', 'retrying')
         RETURNING *",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Tasks created since UTC midnight, for daily-cap gating.
pub async fn created_today(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT count(*) FROM tasks
         WHERE user_id = $1
           AND created_at >= date_trunc('day', now() AT TIME ZONE 'utc') AT TIME ZONE 'utc'",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct StatusSummary {
    pub queued_count: i64,
    pub in_progress_count: i64,
    pub submitted_today: i64,
}

pub async fn status_summary(pool: &PgPool, user_id: Uuid) -> Result<StatusSummary, sqlx::Error> {
    sqlx::query_as::<_, StatusSummary>(
        "SELECT
             count(*) FILTER (WHERE status IN ('queued', 'retrying')) AS queued_count,
             count(*) FILTER (WHERE status = 'in_progress') AS in_progress_count,
             count(*) FILTER (WHERE status = 'submitted'
                 AND updated_at >= date_trunc('day', now() AT TIME ZONE 'utc') AT TIME ZONE 'utc')
                 AS submitted_today
         FROM tasks WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
}

/// Most recent structured failure for the status surface.
pub async fn last_error(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<ApplicationTask>, sqlx::Error> {
    sqlx::query_as::<_, ApplicationTask>(
        "SELECT * FROM tasks
         WHERE user_id = $1 AND last_error_kind IS NOT NULL
         ORDER BY updated_at DESC
         LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_by_user(
    pool: &PgPool,
    user_id: Uuid,
    status: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<ApplicationTask>, sqlx::Error> {
    match status {
        Some(status) => {
            sqlx::query_as::<_, ApplicationTask>(
                "SELECT * FROM tasks
                 WHERE user_id = $1 AND status = $2
                 ORDER BY created_at DESC LIMIT $3 OFFSET $4",
            )
            .bind(user_id)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, ApplicationTask>(
                "SELECT * FROM tasks
                 WHERE user_id = $1
                 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            )
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
        }
    }
}

/// Expired-lease recovery: tasks whose worker died mid-claim go back to the
/// queue with a worker-crash failure recorded, or fail permanently once
/// attempts are exhausted.
pub async fn reclaim_expired(pool: &PgPool) -> Result<Vec<ApplicationTask>, sqlx::Error> {
    sqlx::query_as::<_, ApplicationTask>(
        "UPDATE tasks
         SET status = CASE WHEN attempt_count + 1 >= max_attempts
                           THEN 'failed_permanent' ELSE 'queued' END,
             attempt_count = attempt_count + 1,
             last_error_kind = 'worker_crash',
             last_error_message = 'worker lease expired; attempt lost',
             last_error_screenshot = NULL,
             lease_expires_at = NULL,
             next_eligible_at = GREATEST(next_eligible_at, now()),
             updated_at = now()
         WHERE status = 'in_progress' AND lease_expires_at < now()
         RETURNING *",
    )
    .fetch_all(pool)
    .await
}

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::db;
use crate::error::AppError;
use crate::models::{ApplicationTask, TaskStatus, TimelineEntry};
use crate::settings::gate_new_task;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct CreateTask {
    pub user_id: Uuid,
    pub job_id: String,
    pub resume_id: Option<String>,
    pub job_snapshot: serde_json::Value,
    pub resume_snapshot: serde_json::Value,
}

#[derive(serde::Serialize)]
pub struct TaskWithTimeline {
    #[serde(flatten)]
    pub task: ApplicationTask,
    pub timeline: Vec<TimelineEntry>,
}

/// Task intake from the job-matching collaborator. Snapshots are captured
/// here and never re-fetched: later edits to the job or resume do not change
/// in-flight behavior.
pub async fn create(
    State(state): State<SharedState>,
    Json(req): Json<CreateTask>,
) -> Result<Json<ApplicationTask>, AppError> {
    if req.job_id.is_empty() {
        return Err(AppError::BadRequest("job_id is required".to_string()));
    }

    let settings = state
        .settings
        .get_settings(req.user_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| {
            AppError::Conflict("auto-apply is not configured for this user".to_string())
        })?;

    let active = db::control::is_active(&state.pool, req.user_id).await?;
    let created_today = db::tasks::created_today(&state.pool, req.user_id).await?;

    gate_new_task(&settings, active, created_today)
        .map_err(|refusal| AppError::Conflict(refusal.to_string()))?;

    let resume_id = req
        .resume_id
        .or(settings.resume_id)
        .ok_or_else(|| AppError::BadRequest("no resume selected for this user".to_string()))?;

    let platform = state.adapters.resolve(&req.job_snapshot).platform();

    let task = db::tasks::create(
        &state.pool,
        db::tasks::NewTask {
            user_id: req.user_id,
            job_id: &req.job_id,
            resume_id: &resume_id,
            platform,
            max_attempts: state.config.max_attempts,
            job_snapshot: &req.job_snapshot,
            resume_snapshot: &req.resume_snapshot,
        },
    )
    .await?
    .ok_or_else(|| {
        AppError::DuplicateTask(format!(
            "a live application task already exists for job {}",
            req.job_id
        ))
    })?;

    let detail = json!({ "platform": platform.as_str() });
    db::timeline::append(&state.pool, task.id, TaskStatus::Queued, Some(&detail)).await?;

    tracing::info!(
        "Task {} created (user={}, job={}, platform={platform})",
        task.id,
        task.user_id,
        task.job_id
    );

    Ok(Json(task))
}

pub async fn get(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskWithTimeline>, AppError> {
    let task = db::tasks::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))?;
    let timeline = db::timeline::list_by_task(&state.pool, id).await?;

    Ok(Json(TaskWithTimeline { task, timeline }))
}

/// Cancel a still-pending task. In-flight automation is not interruptible:
/// a task already claimed by a worker cannot be withdrawn.
pub async fn withdraw(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApplicationTask>, AppError> {
    match db::tasks::withdraw(&state.pool, id).await? {
        Some(task) => {
            db::timeline::append(&state.pool, task.id, TaskStatus::Withdrawn, None).await?;
            Ok(Json(task))
        }
        None => {
            if db::tasks::find_by_id(&state.pool, id).await?.is_some() {
                Err(AppError::Conflict(
                    "only queued or retrying tasks can be withdrawn".to_string(),
                ))
            } else {
                Err(AppError::NotFound("Task not found".to_string()))
            }
        }
    }
}

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::db;
use crate::error::AppError;
use crate::models::{ApplicationTask, TaskStatus};
use crate::state::SharedState;
use crate::tracker;

pub async fn start(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    db::control::set_active(&state.pool, user_id, true).await?;
    tracing::info!("Auto-apply started for user {user_id}");
    Ok(Json(json!({ "active": true })))
}

/// Stopping also withdraws every still-pending task; in-flight tasks finish
/// their current automation step and keep their recorded outcome.
pub async fn stop(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    db::control::set_active(&state.pool, user_id, false).await?;

    let withdrawn = db::tasks::withdraw_all_for_user(&state.pool, user_id).await?;
    for task in &withdrawn {
        let detail = json!({ "reason": "auto-apply stopped" });
        db::timeline::append(&state.pool, task.id, TaskStatus::Withdrawn, Some(&detail)).await?;
    }

    tracing::info!(
        "Auto-apply stopped for user {user_id} ({} tasks withdrawn)",
        withdrawn.len()
    );
    Ok(Json(json!({ "active": false, "withdrawn": withdrawn.len() })))
}

pub async fn status(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<tracker::AutoApplyStatus>, AppError> {
    let summary = tracker::status_summary(&state.pool, user_id).await?;
    Ok(Json(summary))
}

#[derive(Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

pub async fn list_applications(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ApplicationTask>>, AppError> {
    if let Some(status) = params.status.as_deref() {
        if TaskStatus::parse(status).is_none() {
            return Err(AppError::BadRequest(format!("Unknown status: {status}")));
        }
    }

    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let tasks =
        db::tasks::list_by_user(&state.pool, user_id, params.status.as_deref(), per_page, offset)
            .await?;
    Ok(Json(tasks))
}

#[derive(Deserialize)]
pub struct ExportParams {
    pub format: Option<String>,
}

pub async fn export_applications(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<ExportParams>,
) -> Result<impl IntoResponse, AppError> {
    let tasks = db::tasks::list_by_user(&state.pool, user_id, None, 10_000, 0).await?;

    match params.format.as_deref().unwrap_or("json") {
        "csv" => {
            let csv = export_csv(&tasks);
            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv"),
                    (
                        header::CONTENT_DISPOSITION,
                        "attachment; filename=\"applications.csv\"",
                    ),
                ],
                csv,
            )
                .into_response())
        }
        "json" => Ok(Json(tasks).into_response()),
        other => Err(AppError::BadRequest(format!("Unknown export format: {other}"))),
    }
}

fn export_csv(tasks: &[ApplicationTask]) -> String {
    use std::fmt::Write;
    let mut csv = String::new();

    let _ = writeln!(
        csv,
        "id,job_id,platform,status,attempt_count,created_at,updated_at,last_error"
    );

    for task in tasks {
        let last_error = match (&task.last_error_kind, &task.last_error_message) {
            (Some(kind), Some(msg)) => format!("{kind}: {msg}"),
            (Some(kind), None) => kind.clone(),
            _ => String::new(),
        };
        let _ = writeln!(
            csv,
            "{},{},{},{},{},{},{},{}",
            task.id,
            csv_escape(&task.job_id),
            task.platform,
            task.status,
            task.attempt_count,
            task.created_at.to_rfc3339(),
            task.updated_at.to_rfc3339(),
            csv_escape(&last_error)
        );
    }

    csv
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::tests_support::task_with;
    use serde_json::json;

    #[test]
    fn csv_escape_quotes_and_commas() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn export_includes_header_and_error_column() {
        let mut task = task_with(json!({}), json!({}));
        task.last_error_kind = Some("transient".to_string());
        task.last_error_message = Some("timeout, again".to_string());

        let csv = export_csv(&[task]);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,job_id,platform,status,attempt_count,created_at,updated_at,last_error"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("\"transient: timeout, again\""));
    }
}

pub mod autoapply;
pub mod tasks;

use axum::routing::{get, post};
use axum::Router;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Task intake (job-matching collaborator) and task inspection
        .route("/api/v1/tasks", post(tasks::create))
        .route("/api/v1/tasks/{id}", get(tasks::get))
        .route("/api/v1/tasks/{id}/withdraw", post(tasks::withdraw))
        // Operator control surface
        .route(
            "/api/v1/users/{user_id}/auto-apply/start",
            post(autoapply::start),
        )
        .route(
            "/api/v1/users/{user_id}/auto-apply/stop",
            post(autoapply::stop),
        )
        .route(
            "/api/v1/users/{user_id}/auto-apply/status",
            get(autoapply::status),
        )
        // Reporting
        .route(
            "/api/v1/users/{user_id}/applications",
            get(autoapply::list_applications),
        )
        .route(
            "/api/v1/users/{user_id}/applications/export",
            get(autoapply::export_applications),
        )
}

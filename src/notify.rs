//! Terminal-state event fan-out. The engine emits one event per task that
//! reaches `submitted` or `failed_permanent`; formatting and delivery to end
//! users belong to the downstream notification service.

use async_trait::async_trait;
use serde_json::json;

use crate::models::ApplicationTask;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn task_terminal(&self, task: &ApplicationTask);
}

/// Posts the event to the configured collaborator webhook. Delivery is
/// best-effort: a failed notification never affects task state.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("Failed to build reqwest client"),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn task_terminal(&self, task: &ApplicationTask) {
        let event = json!({
            "task_id": task.id,
            "user_id": task.user_id,
            "job_id": task.job_id,
            "platform": task.platform,
            "status": task.status,
            "attempt_count": task.attempt_count,
            "last_error_kind": task.last_error_kind,
        });

        match self.client.post(&self.url).json(&event).send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                tracing::warn!("Notification webhook returned {}", resp.status());
            }
            Err(e) => {
                tracing::warn!("Notification webhook failed: {e}");
            }
        }
    }
}

/// Fallback when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn task_terminal(&self, task: &ApplicationTask) {
        tracing::info!(
            task_id = %task.id,
            user_id = %task.user_id,
            job_id = %task.job_id,
            status = %task.status,
            "Task reached terminal state"
        );
    }
}

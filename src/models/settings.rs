use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-user auto-apply configuration, owned by the external settings store.
/// The engine only ever reads this table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct AutoApplySettings {
    pub user_id: Uuid,
    pub enabled: bool,
    pub filters: serde_json::Value,
    pub resume_id: Option<String>,
    pub cover_letter_template: Option<String>,
    pub max_applications_per_day: i32,
    pub auto_respond: bool,
    pub updated_at: DateTime<Utc>,
}

//! Settings store collaborator and the task-creation gate. Settings are
//! owned externally; the engine reads them and never writes.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::models::AutoApplySettings;

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_settings(&self, user_id: Uuid) -> Result<Option<AutoApplySettings>, String>;
}

pub struct PgSettingsStore {
    pool: PgPool,
}

impl PgSettingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for PgSettingsStore {
    async fn get_settings(&self, user_id: Uuid) -> Result<Option<AutoApplySettings>, String> {
        db::settings::find_by_user(&self.pool, user_id)
            .await
            .map_err(|e| format!("Failed to load settings: {e}"))
    }
}

#[derive(Debug, PartialEq)]
pub enum GateRefusal {
    NotStarted,
    Disabled,
    DailyCapReached { cap: i32 },
}

impl std::fmt::Display for GateRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateRefusal::NotStarted => write!(f, "auto-apply has not been started for this user"),
            GateRefusal::Disabled => write!(f, "auto-apply is disabled in user settings"),
            GateRefusal::DailyCapReached { cap } => {
                write!(f, "daily application cap ({cap}) reached")
            }
        }
    }
}

/// Decide whether a new task may be created for this user right now.
pub fn gate_new_task(
    settings: &AutoApplySettings,
    control_active: bool,
    created_today: i64,
) -> Result<(), GateRefusal> {
    if !control_active {
        return Err(GateRefusal::NotStarted);
    }
    if !settings.enabled {
        return Err(GateRefusal::Disabled);
    }
    if created_today >= settings.max_applications_per_day as i64 {
        return Err(GateRefusal::DailyCapReached {
            cap: settings.max_applications_per_day,
        });
    }
    Ok(())
}

//! Read-only access to the settings table owned by the external settings
//! store. The engine never writes here.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::AutoApplySettings;

pub async fn find_by_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<AutoApplySettings>, sqlx::Error> {
    sqlx::query_as::<_, AutoApplySettings>(
        "SELECT * FROM auto_apply_settings WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

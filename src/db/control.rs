//! Engine-owned per-user run state flipped by the start/stop control surface.

use sqlx::PgPool;
use uuid::Uuid;

pub async fn set_active(pool: &PgPool, user_id: Uuid, active: bool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO auto_apply_control (user_id, active)
         VALUES ($1, $2)
         ON CONFLICT (user_id) DO UPDATE SET active = $2, updated_at = now()",
    )
    .bind(user_id)
    .bind(active)
    .execute(pool)
    .await?;
    Ok(())
}

/// Users with no control row have never been started.
pub async fn is_active(pool: &PgPool, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let active = sqlx::query_scalar::<_, bool>(
        "SELECT active FROM auto_apply_control WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(active.unwrap_or(false))
}

//! Permission grants (`permissions` and `users_permissions`).

use estate_core::Permissions;
use sqlx::PgPool;

pub async fn get_all_for_user(pool: &PgPool, user_id: i64) -> Result<Permissions, sqlx::Error> {
    let codes: Vec<String> = sqlx::query_scalar(
        "SELECT p.code
         FROM permissions p
         INNER JOIN users_permissions up ON up.permission_id = p.id
         WHERE up.user_id = $1",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(codes.into_iter().collect())
}

/// Grant `codes`; already-held codes are ignored.
pub async fn add_for_user(pool: &PgPool, user_id: i64, codes: &[&str]) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users_permissions (user_id, permission_id)
         SELECT $1, p.id FROM permissions p WHERE p.code = ANY($2)
         ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(codes)
    .execute(pool)
    .await?;
    Ok(())
}

//! Token persistence. Only the SHA-256 digest is stored.

use estate_core::{Token, TokenScope};
use sqlx::PgPool;

pub async fn insert(pool: &PgPool, token: &Token) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO tokens (hash, user_id, expiry, scope) VALUES ($1, $2, $3, $4)")
        .bind(&token.hash[..])
        .bind(token.user_id)
        .bind(token.expiry)
        .bind(token.scope.as_str())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_all_for_user(
    pool: &PgPool,
    scope: TokenScope,
    user_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
        .bind(scope.as_str())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

//! User persistence operations on the `users` table.

use chrono::{DateTime, Utc};
use estate_core::token::TokenHash;
use estate_core::{Password, TokenScope, User};
use sqlx::PgPool;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    fullname: String,
    email: String,
    phone: String,
    address: String,
    district_id: i64,
    user_type_id: i64,
    profile_image_url: Option<String>,
    activated: bool,
    created_at: DateTime<Utc>,
    version: i32,
    password_hash: String,
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            id: self.id,
            username: self.username,
            fullname: self.fullname,
            email: self.email,
            phone: self.phone,
            address: self.address,
            district_id: self.district_id,
            user_type_id: self.user_type_id,
            profile_image_url: self.profile_image_url,
            activated: self.activated,
            created_at: self.created_at,
            version: self.version,
            password: Password::from_hash(self.password_hash),
        }
    }
}

/// Insert a user; returns the generated id, creation time and version.
pub async fn insert(
    pool: &PgPool,
    user: &User,
) -> Result<(i64, DateTime<Utc>, i32), sqlx::Error> {
    sqlx::query_as(
        "INSERT INTO users (username, fullname, email, phone, address, district_id,
                            user_type_id, profile_image_url, activated, password_hash)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         RETURNING id, created_at, version",
    )
    .bind(&user.username)
    .bind(&user.fullname)
    .bind(&user.email)
    .bind(&user.phone)
    .bind(&user.address)
    .bind(user.district_id)
    .bind(user.user_type_id)
    .bind(&user.profile_image_url)
    .bind(user.activated)
    .bind(user.password.hash())
    .fetch_one(pool)
    .await
}

pub async fn get_by_id(pool: &PgPool, id: i64) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, fullname, email, phone, address, district_id, user_type_id,
                profile_image_url, activated, created_at, version, password_hash
         FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(UserRow::into_user))
}

pub async fn get_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, fullname, email, phone, address, district_id, user_type_id,
                profile_image_url, activated, created_at, version, password_hash
         FROM users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(UserRow::into_user))
}

/// Write back `user` when its version is current.
///
/// Returns the new version, or `None` if the row changed (or vanished) since
/// it was read.
pub async fn update(pool: &PgPool, user: &User) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar(
        "UPDATE users
         SET username = $1, fullname = $2, email = $3, phone = $4, address = $5,
             district_id = $6, user_type_id = $7, profile_image_url = $8,
             activated = $9, password_hash = $10, version = version + 1
         WHERE id = $11 AND version = $12
         RETURNING version",
    )
    .bind(&user.username)
    .bind(&user.fullname)
    .bind(&user.email)
    .bind(&user.phone)
    .bind(&user.address)
    .bind(user.district_id)
    .bind(user.user_type_id)
    .bind(&user.profile_image_url)
    .bind(user.activated)
    .bind(user.password.hash())
    .bind(user.id)
    .bind(user.version)
    .fetch_optional(pool)
    .await
}

/// Owner of the unexpired `scope` token whose digest is `hash`.
pub async fn get_for_token(
    pool: &PgPool,
    scope: TokenScope,
    hash: &TokenHash,
) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT u.id, u.username, u.fullname, u.email, u.phone, u.address, u.district_id,
                u.user_type_id, u.profile_image_url, u.activated, u.created_at, u.version,
                u.password_hash
         FROM users u
         INNER JOIN tokens t ON t.user_id = u.id
         WHERE t.hash = $1 AND t.scope = $2 AND t.expiry > $3",
    )
    .bind(&hash[..])
    .bind(scope.as_str())
    .bind(Utc::now())
    .fetch_optional(pool)
    .await?;
    Ok(row.map(UserRow::into_user))
}

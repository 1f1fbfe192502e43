//! Login: exchanges a username and password for an authentication token.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use estate_core::{password, Token, TokenScope, Validator};
use serde::{Deserialize, Serialize};

use crate::auth::credentials::verify_password;
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;
use crate::store::StoreError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenEnvelope {
    pub authentication_token: Token,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/tokens/authentication", post(create_authentication_token))
}

/// POST /v1/tokens/authentication
///
/// Unknown usernames and wrong passwords get the same 401.
async fn create_authentication_token(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenEnvelope>), AppError> {
    let input = extract_json(body)?;

    let mut v = Validator::new();
    v.check(!input.username.is_empty(), "username", "must be provided");
    password::validate_plaintext(&mut v, &input.password);
    v.finish()?;

    let user = match state.models.users.user_by_username(&input.username).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(AppError::InvalidCredentials),
        Err(e) => return Err(e.into()),
    };

    if !verify_password(user.password.clone(), input.password).await? {
        tracing::warn!(user_id = user.id, "login failed: wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let token = state
        .credentials
        .issue_token(
            user.id,
            TokenScope::Authentication.default_ttl(),
            TokenScope::Authentication,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(TokenEnvelope {
            authentication_token: token,
        }),
    ))
}

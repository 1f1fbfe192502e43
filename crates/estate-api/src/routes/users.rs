//! # Users
//!
//! Registration, activation, profile reads and profile images.
//!
//! Registration grants `listings:read`, issues a three-day activation token
//! and hands the `user_welcome` notification to a background task, so the
//! 202 response never waits on delivery.
//!
//! Profile images are uploaded as `multipart/form-data` with a single file
//! under `profile_image`.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use estate_core::identity::validate_user;
use estate_core::permissions::LISTINGS_READ;
use estate_core::{password, token, Password, TokenScope, User, Validator};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::credentials::hash_password;
use crate::auth::gates::protect;
use crate::auth::{AuthenticatedUser, Gate, Guard};
use crate::error::AppError;
use crate::extractors::{extract_json, IdParam};
use crate::state::AppState;
use crate::store::StoreError;
use crate::uploads::{read_files, MAX_UPLOAD_BYTES};

/// Template name of the activation message.
pub const WELCOME_TEMPLATE: &str = "user_welcome";

/// Form field carrying the profile image file.
pub const PROFILE_IMAGE_FIELD: &str = "profile_image";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub fullname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub district_id: i64,
    #[serde(default)]
    pub user_type_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivationRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub user: User,
}

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/users", post(register_user))
        .route("/v1/users/activated", put(activate_user))
        .route(
            "/v1/users/{id}",
            protect(get(show_user), Gate::new(state, Guard::activated())),
        )
        .route(
            "/v1/users/{id}/profile-image",
            protect(
                put(update_profile_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
                Gate::new(state, Guard::activated()),
            ),
        )
}

/// POST /v1/users
async fn register_user(
    State(state): State<AppState>,
    body: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserEnvelope>), AppError> {
    let input = extract_json(body)?;

    let mut v = Validator::new();
    password::validate_plaintext(&mut v, &input.password);
    let credential = if v.valid() {
        hash_password(input.password).await?
    } else {
        Password::default()
    };

    let mut user = User {
        id: 0,
        username: input.username,
        fullname: input.fullname,
        email: input.email,
        phone: input.phone,
        address: input.address,
        district_id: input.district_id,
        user_type_id: input.user_type_id,
        profile_image_url: input.profile_image_url.filter(|url| !url.is_empty()),
        activated: false,
        created_at: Utc::now(),
        version: 1,
        password: credential,
    };
    validate_user(&mut v, &user);
    v.finish()?;

    state.models.users.insert_user(&mut user).await?;
    state
        .models
        .permissions
        .grant(user.id, &[LISTINGS_READ])
        .await?;

    let activation = state
        .credentials
        .issue_token(
            user.id,
            TokenScope::Activation.default_ttl(),
            TokenScope::Activation,
        )
        .await?;

    let notifier = state.notifier.clone();
    let recipient = user.email.clone();
    let data = json!({
        "activation_token": activation.plaintext,
        "user_id": user.id,
    });
    state.background.spawn(WELCOME_TEMPLATE, async move {
        notifier.send(&recipient, WELCOME_TEMPLATE, data).await
    });

    tracing::info!(user_id = user.id, "user registered");
    Ok((StatusCode::ACCEPTED, Json(UserEnvelope { user })))
}

/// PUT /v1/users/activated
async fn activate_user(
    State(state): State<AppState>,
    body: Result<Json<ActivationRequest>, JsonRejection>,
) -> Result<Json<UserEnvelope>, AppError> {
    let input = extract_json(body)?;

    let mut v = Validator::new();
    token::validate_plaintext(&mut v, &input.token);
    v.finish()?;

    let mut user = match state
        .credentials
        .consume(TokenScope::Activation, &input.token)
        .await
    {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            return Err(AppError::field(
                "token",
                "invalid or expired activation token",
            ))
        }
        Err(e) => return Err(e.into()),
    };

    user.activated = true;
    state.models.users.update_user(&mut user).await?;
    state
        .credentials
        .revoke_all(TokenScope::Activation, user.id)
        .await?;

    tracing::info!(user_id = user.id, "user activated");
    Ok(Json(UserEnvelope { user }))
}

/// GET /v1/users/{id}
async fn show_user(
    State(state): State<AppState>,
    IdParam(id): IdParam,
) -> Result<Json<UserEnvelope>, AppError> {
    let user = state.models.users.user_by_id(id).await?;
    Ok(Json(UserEnvelope { user }))
}

/// PUT /v1/users/{id}/profile-image
///
/// Users may only change their own image.
async fn update_profile_image(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    IdParam(id): IdParam,
    form: Result<Multipart, MultipartRejection>,
) -> Result<Json<UserEnvelope>, AppError> {
    if caller.id != id {
        tracing::warn!(user_id = caller.id, target = id, "profile update for another user");
        return Err(AppError::PermissionDenied);
    }

    let mut files = read_files(form, PROFILE_IMAGE_FIELD).await?;
    let file = match (files.pop(), files.is_empty()) {
        (Some(file), true) => file,
        (None, _) => return Err(AppError::field(PROFILE_IMAGE_FIELD, "must be provided")),
        (Some(_), false) => {
            return Err(AppError::field(PROFILE_IMAGE_FIELD, "must be a single file"))
        }
    };

    let mut user = state.models.users.user_by_id(id).await?;
    let path = state
        .uploads
        .store(&file.file_name, file.bytes)
        .await
        .map_err(|e| e.for_field(PROFILE_IMAGE_FIELD))?;
    user.profile_image_url = Some(path);
    state.models.users.update_user(&mut user).await?;
    tracing::info!(user_id = user.id, "profile image updated");
    Ok(Json(UserEnvelope { user }))
}

//! # Bearer Token Authentication
//!
//! Runs on every request. No `Authorization` header means the request is
//! anonymous, which is not an error: the gates decide later whether the
//! route allows it. A header that is not `Bearer <26-char token>`, and a
//! token that does not resolve, both fail with the same 401 so the caller
//! cannot tell which it was.
//!
//! Every response passing through here, including rejections, carries
//! `Vary: Authorization`.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use estate_core::{token, Identity, TokenScope, User};

use crate::auth::CredentialStore;
use crate::error::AppError;
use crate::state::AppState;
use crate::store::StoreError;

pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut response = match resolve_identity(&state.credentials, request.headers()).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    };
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

/// Turn the `Authorization` header into an [`Identity`].
pub async fn resolve_identity(
    credentials: &CredentialStore,
    headers: &HeaderMap,
) -> Result<Identity, AppError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(Identity::Anonymous);
    };

    let plaintext = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| token::is_well_formed(t))
        .ok_or_else(|| {
            tracing::warn!("authentication failed: malformed authorization header");
            AppError::InvalidToken
        })?;

    match credentials
        .consume(TokenScope::Authentication, plaintext)
        .await
    {
        Ok(user) => Ok(Identity::Authenticated(user)),
        Err(StoreError::NotFound) => {
            tracing::warn!("authentication failed: unknown or expired token");
            Err(AppError::InvalidToken)
        }
        Err(e) => Err(e.into()),
    }
}

/// The identity resolved by [`authenticate`].
///
/// Rejects with a server fault if the middleware did not run, which is a
/// wiring mistake rather than a client error.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

impl<S: Send + Sync> FromRequestParts<S> for CurrentIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentIdentity)
            .ok_or_else(|| AppError::Internal("no identity in request context".into()))
    }
}

/// The authenticated user; anonymous requests are rejected with 401.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentIdentity(identity) = CurrentIdentity::from_request_parts(parts, state).await?;
        identity
            .into_user()
            .map(AuthenticatedUser)
            .ok_or(AppError::AuthenticationRequired)
    }
}

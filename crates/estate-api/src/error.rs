//! # API Error Types
//!
//! Every failure a handler or middleware can produce, mapped onto an HTTP
//! status and the `{"error": ...}` envelope. The value is a message string,
//! or a field-to-message map for validation failures. Internal details are
//! logged and never sent to the client.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use estate_core::{CredentialError, FieldErrors, TokenError, UnsafeSort};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Message returned for every 500.
pub const SERVER_FAULT_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

/// JSON error envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ErrorPayload {
    Message(String),
    Fields(FieldErrors),
}

#[derive(Error, Debug)]
pub enum AppError {
    /// One or more request fields failed validation (422).
    #[error("validation failed")]
    Validation(FieldErrors),

    /// The request could not be decoded (400).
    #[error("{0}")]
    BadRequest(String),

    #[error("the requested resource could not be found")]
    NotFound,

    #[error("the {0} method is not supported for this resource")]
    MethodNotAllowed(String),

    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,

    #[error("invalid authentication credentials")]
    InvalidCredentials,

    /// Malformed, unknown and expired bearer tokens all look the same (401).
    #[error("invalid or missing authentication token")]
    InvalidToken,

    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,

    #[error("your user account must be activated to access this resource")]
    AccountInactive,

    #[error("your user account doesn't have the necessary permissions to access this resource")]
    PermissionDenied,

    #[error("rate limit exceeded")]
    RateLimited,

    /// Unexpected failure (500). The detail is logged, not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a single-field validation failure.
    pub fn field(key: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(key.to_owned(), message.to_owned());
        Self::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::EditConflict => StatusCode::CONFLICT,
            Self::InvalidCredentials | Self::InvalidToken | Self::AuthenticationRequired => {
                StatusCode::UNAUTHORIZED
            }
            Self::AccountInactive | Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let challenge = matches!(self, Self::InvalidToken);

        if let Self::Internal(detail) = &self {
            tracing::error!(error = %detail, "server fault");
        }

        let payload = match self {
            Self::Validation(fields) => ErrorPayload::Fields(fields),
            Self::Internal(_) => ErrorPayload::Message(SERVER_FAULT_MESSAGE.to_owned()),
            other => ErrorPayload::Message(other.to_string()),
        };

        let mut response = (status, Json(ErrorBody { error: payload })).into_response();
        if challenge {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::EditConflict => Self::EditConflict,
            StoreError::DuplicateEmail => {
                Self::field("email", "a user with this email address already exists")
            }
            StoreError::DuplicateUsername => {
                Self::field("username", "a user with this username already exists")
            }
            StoreError::UnknownReference(key) => {
                Self::field(key, "must reference an existing record")
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::WeakInput => Self::field("password", "must be provided"),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<UnsafeSort> for AppError {
    fn from(err: UnsafeSort) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {err}"))
    }
}

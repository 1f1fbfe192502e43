//! # estate-api: HTTP Service for the Listing Platform
//!
//! JSON over HTTP on axum/tower/tokio. Persistence is Postgres through
//! sqlx, or an in-memory store when no database URL is configured.
//!
//! ## API Surface
//!
//! | Route                                | Gate                      |
//! |--------------------------------------|---------------------------|
//! | `GET /v1/healthcheck`                | public                    |
//! | `POST /v1/users`                     | public                    |
//! | `PUT /v1/users/activated`            | public                    |
//! | `GET /v1/users/{id}`                 | activated                 |
//! | `PUT /v1/users/{id}/profile-image`   | activated, own profile    |
//! | `POST /v1/tokens/authentication`     | public                    |
//! | `GET /v1/listings`, `/{id}`          | public                    |
//! | `POST /v1/listings`, `PATCH /{id}`   | `listings:write`          |
//! | `POST /v1/listings/{id}/images`      | `listings:write`          |
//! | `POST /v1/agents/listings`           | `listings:write`          |
//! | `GET /v1/agents/{id}/listings`       | public                    |
//! | `GET /v1/reports/*`                  | `reports:read`            |
//! | `GET /uploads/{file}`                | public                    |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → panic recovery → rate limiter → CORS → authenticate → gates → handler
//! ```

pub mod auth;
pub mod background;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod notify;
pub mod routes;
pub mod shutdown;
pub mod state;
pub mod store;
pub mod uploads;

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::{Extension, Router};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use error::AppError;
pub use state::AppState;

use crate::extractors::MAX_BODY_BYTES;

/// Assemble the application router with every route and middleware.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::users::router(&state))
        .merge(routes::tokens::router())
        .merge(routes::listings::router(&state))
        .merge(routes::agents::router(&state))
        .merge(routes::reports::router(&state))
        .nest_service(uploads::PUBLIC_PREFIX, ServeDir::new(&state.config.upload_dir))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(from_fn_with_state(state.clone(), auth::authenticate))
        .layer(middleware::cors::layer(&state.config.cors_trusted_origins))
        .layer(from_fn(middleware::rate_limit::rate_limit))
        .layer(Extension(state.limiter.clone()))
        .layer(middleware::recover::layer())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound
}

async fn method_not_allowed(method: Method) -> AppError {
    AppError::MethodNotAllowed(method.to_string())
}

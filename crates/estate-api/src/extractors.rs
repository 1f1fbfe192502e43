//! # Custom Extractors & Validation
//!
//! Provides the [`Validate`] trait for request bodies, helpers to extract
//! and validate JSON, query-string readers that record conversion failures
//! as field errors, and the [`IdParam`] path extractor.

use std::collections::HashMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, Path, Query};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use estate_core::agent::{self, AgentAssignment};
use estate_core::listing::{self, Listing, ListingImages};
use estate_core::Validator;

use crate::error::AppError;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1_048_576;

/// Request types whose business rules go beyond what serde checks.
pub trait Validate {
    /// Record every rule violation in `v`.
    fn validate(&self, v: &mut Validator);
}

impl Validate for Listing {
    fn validate(&self, v: &mut Validator) {
        listing::validate_listing(v, self);
    }
}

impl Validate for ListingImages {
    fn validate(&self, v: &mut Validator) {
        listing::validate_listing_images(v, self);
    }
}

impl Validate for AgentAssignment {
    fn validate(&self, v: &mut Validator) {
        agent::validate_assignment(v, self);
    }
}

/// Run `value`'s rules, failing with every field error at once.
pub fn validate<T: Validate>(value: &T) -> Result<(), AppError> {
    let mut v = Validator::new();
    value.validate(&mut v);
    v.finish()?;
    Ok(())
}

/// Extract a JSON body, mapping decode failures to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result.map(|Json(v)| v).map_err(|err| {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::BadRequest(format!(
                "body must not be larger than {MAX_BODY_BYTES} bytes"
            ))
        } else {
            AppError::BadRequest(err.body_text())
        }
    })
}

/// Extract a JSON body and validate it.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    validate(&value)?;
    Ok(value)
}

/// Raw query-string pairs; a malformed query string is a 400.
#[derive(Debug, Clone, Default)]
pub struct QueryParams(pub HashMap<String, String>);

impl<S: Send + Sync> FromRequestParts<S> for QueryParams {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|err| AppError::BadRequest(err.body_text()))?;
        Ok(Self(pairs))
    }
}

impl QueryParams {
    /// The value for `key`, or `default` when absent or empty.
    pub fn read_string(&self, key: &str, default: &str) -> String {
        match self.0.get(key) {
            Some(value) if !value.is_empty() => value.clone(),
            _ => default.to_owned(),
        }
    }

    /// The integer value for `key`, or `default` when absent or empty. A
    /// value that does not parse is recorded in `v` and `default` returned.
    pub fn read_int(&self, key: &str, default: i64, v: &mut Validator) -> i64 {
        match self.0.get(key) {
            Some(value) if !value.is_empty() => value.parse().unwrap_or_else(|_| {
                v.add_error(key, "must be an integer value");
                default
            }),
            _ => default,
        }
    }
}

/// A positive integer `{id}` path segment. Anything else is a 404.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdParam(pub i64);

impl<S: Send + Sync> FromRequestParts<S> for IdParam {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::NotFound)?;
        match raw.parse::<i64>() {
            Ok(id) if id >= 1 => Ok(Self(id)),
            _ => Err(AppError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use estate_core::listing::NewListing;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        QueryParams(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        )
    }

    #[test]
    fn read_int_records_non_integers() {
        let qs = params(&[("page", "two"), ("page_size", "5"), ("sort", "")]);
        let mut v = Validator::new();
        assert_eq!(qs.read_int("page", 1, &mut v), 1);
        assert_eq!(qs.read_int("page_size", 20, &mut v), 5);
        assert_eq!(qs.read_int("missing", 7, &mut v), 7);
        assert_eq!(qs.read_string("sort", "id"), "id");
        assert_eq!(v.errors()["page"], "must be an integer value");
        assert_eq!(v.errors().len(), 1);
    }

    #[test]
    fn validate_collects_all_fields() {
        let listing = NewListing {
            property_title: "Short".into(),
            property_status_id: 1,
            property_type_id: 1,
            price: 10.0,
            description: "Too short".into(),
            address: "Somewhere in Corozal".into(),
            district_id: 1,
            google_map_url: "https://maps.example/x".into(),
        }
        .into_listing();
        match validate(&listing) {
            Err(AppError::Validation(fields)) => {
                assert!(fields.contains_key("property_title"));
                assert!(fields.contains_key("description"));
                assert!(!fields.contains_key("address"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    async fn id_from(uri: &str) -> Result<IdParam, AppError> {
        use axum::routing::get;
        use axum::Router;
        use tower::ServiceExt;

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let app = Router::new().route(
            "/v1/listings/{id}",
            get(move |id: Result<IdParam, AppError>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(id);
                }
            }),
        );
        app.oneshot(Request::builder().uri(uri).body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        rx.recv().await.unwrap()
    }

    #[tokio::test]
    async fn id_param_accepts_positive_integers_only() {
        assert_eq!(id_from("/v1/listings/42").await.unwrap(), IdParam(42));
        assert!(matches!(id_from("/v1/listings/0").await, Err(AppError::NotFound)));
        assert!(matches!(id_from("/v1/listings/-3").await, Err(AppError::NotFound)));
        assert!(matches!(id_from("/v1/listings/abc").await, Err(AppError::NotFound)));
    }
}

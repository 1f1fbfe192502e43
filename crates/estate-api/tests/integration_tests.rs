//! # Integration Tests for estate-api
//!
//! Drives the full router (middleware stack included) against the in-memory
//! store: registration and activation, login, the gate stages, listing
//! search and pagination, image uploads, agent assignment, reports, rate
//! limiting and the error envelope.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use estate_api::config::Config;
use estate_api::notify::{Notifier, NotifyError};
use estate_api::store::memory::MemoryStore;
use estate_api::store::{ListingStore, Models, PermissionStore, UserStore};
use estate_api::AppState;
use estate_core::listing::NewListing;
use estate_core::permissions::{LISTINGS_READ, LISTINGS_WRITE, REPORTS_READ};
use estate_core::{Password, TokenScope, User};

/// Captures notifications instead of delivering them.
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String, Value)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: &str, template: &str, data: Value) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .push((recipient.to_owned(), template.to_owned(), data));
        Ok(())
    }
}

struct TestApp {
    router: Router,
    state: AppState,
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
    uploads: TempDir,
}

fn quiet_config() -> Config {
    Config {
        limiter_enabled: false,
        ..Config::default()
    }
}

/// Helper: build the app on a fresh in-memory store.
fn test_app_with(config: Config) -> TestApp {
    let uploads = tempfile::tempdir().unwrap();
    let config = Config {
        upload_dir: uploads.path().to_path_buf(),
        ..config
    };
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let state = AppState::new(config, Models::memory(store.clone()), notifier.clone());
    TestApp {
        router: estate_api::app(state.clone()),
        state,
        store,
        notifier,
        uploads,
    }
}

fn test_app() -> TestApp {
    test_app_with(quiet_config())
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Insert a user directly and return it with a fresh bearer token.
    async fn user_with_token(&self, username: &str, activated: bool, grants: &[&str]) -> (User, String) {
        let mut user = User {
            id: 0,
            username: username.to_owned(),
            fullname: format!("{username} Fullname"),
            email: format!("{username}@example.bz"),
            phone: "501-610-1234".into(),
            address: "12 Albert Street".into(),
            district_id: 1,
            user_type_id: 2,
            profile_image_url: None,
            activated,
            created_at: chrono::Utc::now(),
            version: 0,
            password: Password::from_hash("$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"),
        };
        self.store.insert_user(&mut user).await.unwrap();
        self.store.grant(user.id, grants).await.unwrap();
        let token = self
            .state
            .credentials
            .issue_token(user.id, chrono::Duration::hours(24), TokenScope::Authentication)
            .await
            .unwrap();
        (user, token.plaintext)
    }

    async fn seed_listings(&self, titles: &[&str]) {
        for (i, title) in titles.iter().enumerate() {
            let mut listing = NewListing {
                property_title: (*title).to_owned(),
                property_status_id: 1,
                property_type_id: 1,
                price: 10_000.0 * (i as f64 + 1.0),
                description: "Well kept property with a view".into(),
                address: "1 Coastal Road".into(),
                district_id: 5,
                google_map_url: "https://maps.example/x".into(),
            }
            .into_listing();
            self.store.insert_listing(&mut listing).await.unwrap();
        }
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_as(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

const BOUNDARY: &str = "estate-test-boundary";

/// A form part: field name, optional file name, content.
type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

fn multipart_request(method: &str, uri: &str, token: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for (field, file_name, content) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let disposition = match file_name {
            Some(name) => format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            ),
            None => format!("Content-Disposition: form-data; name=\"{field}\"\r\n\r\n"),
        };
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

/// Helper: read response body as JSON.
async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn listing_body() -> Value {
    json!({
        "property_title": "Two storey house in San Ignacio",
        "property_status_id": 1,
        "property_type_id": 1,
        "price": 185000.0,
        "description": "Four bedrooms, large yard, close to the market",
        "address": "22 Burns Avenue",
        "district_id": 2,
        "google_map_url": "https://maps.example/san-ignacio"
    })
}

// -- Health ---------------------------------------------------------------

#[tokio::test]
async fn healthcheck_reports_environment() {
    let app = test_app();
    let response = app.send(get("/v1/healthcheck")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "available");
    assert_eq!(body["system_info"]["environment"], "development");
}

#[tokio::test]
async fn unknown_route_uses_json_envelope() {
    let app = test_app();
    let response = app.send(get("/v1/nowhere")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "the requested resource could not be found");
}

#[tokio::test]
async fn wrong_method_is_405() {
    let app = test_app();
    let response = app
        .send(
            Request::builder()
                .method("DELETE")
                .uri("/v1/healthcheck")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body = body_json(response).await;
    assert_eq!(
        body["error"],
        "the DELETE method is not supported for this resource"
    );
}

// -- Registration & Activation --------------------------------------------

#[tokio::test]
async fn register_activate_and_revoke() {
    let app = test_app();
    let response = app
        .send(json_request(
            "POST",
            "/v1/users",
            None,
            &json!({
                "username": "imer",
                "password": "pa55word-pa55word",
                "fullname": "Imer Lopez",
                "email": "imer@example.bz",
                "phone": "501-622-1234",
                "address": "5 Cleghorn Street",
                "district_id": 1,
                "user_type_id": 2
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    let user_id = body["user"]["id"].as_i64().unwrap();
    assert_eq!(body["user"]["activated"], false);
    assert!(body["user"].get("password").is_none());

    assert!(app.state.background.wait(Duration::from_secs(5)).await);
    let (recipient, template, data) = app.notifier.sent.lock()[0].clone();
    assert_eq!(recipient, "imer@example.bz");
    assert_eq!(template, "user_welcome");
    let token = data["activation_token"].as_str().unwrap().to_owned();
    assert_eq!(token.len(), 26);
    assert_eq!(app.store.token_count(TokenScope::Activation, user_id), 1);

    let permissions = app.store.permissions_for(user_id).await.unwrap();
    assert!(permissions.includes(LISTINGS_READ));

    let response = app
        .send(json_request(
            "PUT",
            "/v1/users/activated",
            None,
            &json!({ "token": token }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["activated"], true);
    assert_eq!(app.store.token_count(TokenScope::Activation, user_id), 0);

    // The consumed token no longer works.
    let response = app
        .send(json_request(
            "PUT",
            "/v1/users/activated",
            None,
            &json!({ "token": token }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["token"], "invalid or expired activation token");
}

#[tokio::test]
async fn registration_reports_every_bad_field() {
    let app = test_app();
    let response = app
        .send(json_request(
            "POST",
            "/v1/users",
            None,
            &json!({
                "username": "",
                "password": "short",
                "fullname": "Someone",
                "email": "not-an-email",
                "phone": "12",
                "address": "5 Cleghorn Street",
                "district_id": 1,
                "user_type_id": 2
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["username"], "must be provided");
    assert_eq!(body["error"]["password"], "must be at least 8 bytes long");
    assert_eq!(body["error"]["email"], "must be a valid email address");
    assert_eq!(body["error"]["phone"], "must be a valid phone number");
    assert!(app.notifier.sent.lock().is_empty());
}

#[tokio::test]
async fn duplicate_email_is_a_field_error() {
    let app = test_app();
    app.user_with_token("taken", true, &[]).await;
    let response = app
        .send(json_request(
            "POST",
            "/v1/users",
            None,
            &json!({
                "username": "other",
                "password": "pa55word-pa55word",
                "fullname": "Other Person",
                "email": "TAKEN@example.bz",
                "phone": "501-622-1234",
                "address": "5 Cleghorn Street",
                "district_id": 1,
                "user_type_id": 2
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(
        body["error"]["email"],
        "a user with this email address already exists"
    );
}

#[tokio::test]
async fn unknown_fields_are_rejected() {
    let app = test_app();
    let response = app
        .send(json_request(
            "POST",
            "/v1/tokens/authentication",
            None,
            &json!({ "username": "a", "password": "pa55word", "admin": true }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("admin"));
}

// -- Login ----------------------------------------------------------------

#[tokio::test]
async fn login_issues_a_usable_token() {
    let app = test_app();
    let mut user = User {
        id: 0,
        username: "carla".into(),
        fullname: "Carla Bol".into(),
        email: "carla@example.bz".into(),
        phone: "501-622-9999".into(),
        address: "7 Barrack Road".into(),
        district_id: 1,
        user_type_id: 3,
        profile_image_url: None,
        activated: true,
        created_at: chrono::Utc::now(),
        version: 0,
        password: Password::set("correct horse battery").unwrap(),
    };
    app.store.insert_user(&mut user).await.unwrap();

    let response = app
        .send(json_request(
            "POST",
            "/v1/tokens/authentication",
            None,
            &json!({ "username": "carla", "password": "wrong password" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(json_request(
            "POST",
            "/v1/tokens/authentication",
            None,
            &json!({ "username": "nobody", "password": "correct horse battery" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["error"],
        "invalid authentication credentials"
    );

    let response = app
        .send(json_request(
            "POST",
            "/v1/tokens/authentication",
            None,
            &json!({ "username": "carla", "password": "correct horse battery" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let token = body["authentication_token"]["token"].as_str().unwrap().to_owned();
    assert!(body["authentication_token"]["expiry"].is_string());

    let response = app
        .send(get_as(&format!("/v1/users/{}", user.id), &token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["user"]["username"], "carla");
}

// -- Authentication & Gates -----------------------------------------------

#[tokio::test]
async fn every_response_varies_on_authorization() {
    let app = test_app();
    for request in [get("/v1/listings"), get("/v1/nowhere"), get_as("/v1/listings", "bad")] {
        let response = app.send(request).await;
        assert_eq!(response.headers()[header::VARY], "Authorization");
    }
}

#[tokio::test]
async fn invalid_token_is_401_with_challenge() {
    let app = test_app();
    let response = app
        .send(get_as("/v1/listings", "ABCDEFGHIJKLMNOPQRSTUVWXYZ"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    assert_eq!(
        body_json(response).await["error"],
        "invalid or missing authentication token"
    );
}

#[tokio::test]
async fn anonymous_write_requires_authentication() {
    let app = test_app();
    let response = app
        .send(json_request("POST", "/v1/listings", None, &listing_body()))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    assert_eq!(
        body_json(response).await["error"],
        "you must be authenticated to access this resource"
    );
}

#[tokio::test]
async fn inactive_account_is_forbidden() {
    let app = test_app();
    let (_, token) = app.user_with_token("dormant", false, &[LISTINGS_WRITE]).await;
    let response = app
        .send(json_request("POST", "/v1/listings", Some(&token), &listing_body()))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await["error"],
        "your user account must be activated to access this resource"
    );
}

#[tokio::test]
async fn missing_write_grant_is_permission_denied() {
    let app = test_app();
    let (_, token) = app.user_with_token("reader", true, &[LISTINGS_READ]).await;
    let response = app
        .send(json_request("POST", "/v1/listings", Some(&token), &listing_body()))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await["error"],
        "your user account doesn't have the necessary permissions to access this resource"
    );
}

#[tokio::test]
async fn profile_image_is_owner_only() {
    let app = test_app();
    let (owner, token) = app.user_with_token("owner", true, &[]).await;
    let (other, _) = app.user_with_token("other", true, &[]).await;
    let image: &[u8] = b"\x89PNG\r\n\x1a\nfake image";

    let response = app
        .send(multipart_request(
            "PUT",
            &format!("/v1/users/{}/profile-image", other.id),
            &token,
            &[("profile_image", Some("me.png"), image)],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(multipart_request(
            "PUT",
            &format!("/v1/users/{}/profile-image", owner.id),
            &token,
            &[("profile_image", Some("me.png"), image)],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let path = body_json(response).await["user"]["profile_image_url"]
        .as_str()
        .unwrap()
        .to_owned();
    assert!(path.starts_with("/uploads/"));
    assert!(path.ends_with("-me.png"));

    let response = app.send(get(&path)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, image);
}

#[tokio::test]
async fn profile_image_upload_rejects_bad_forms() {
    let app = test_app();
    let (owner, token) = app.user_with_token("owner", true, &[]).await;
    let uri = format!("/v1/users/{}/profile-image", owner.id);

    let response = app.send(multipart_request("PUT", &uri, &token, &[])).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"]["profile_image"], "must be provided");

    let response = app
        .send(multipart_request(
            "PUT",
            &uri,
            &token,
            &[("profile_image", Some("../../run.sh"), &b"#!/bin/sh"[..])],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(response).await["error"]["profile_image"],
        "must be a jpg, jpeg, png, gif or webp image"
    );

    let response = app
        .send(multipart_request(
            "PUT",
            &uri,
            &token,
            &[("profile_image", None, &b"/uploads/elsewhere.png"[..])],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .send(json_request(
            "PUT",
            &uri,
            Some(&token),
            &json!({ "image_url": "/uploads/me.png" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(std::fs::read_dir(app.uploads.path()).map_or(0, |d| d.count()), 0);
}

// -- Listings -------------------------------------------------------------

#[tokio::test]
async fn create_show_and_update_listing() {
    let app = test_app();
    let (_, token) = app.user_with_token("writer", true, &[LISTINGS_WRITE]).await;

    let response = app
        .send(json_request("POST", "/v1/listings", Some(&token), &listing_body()))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_owned();
    let body = body_json(response).await;
    let id = body["listing"]["id"].as_i64().unwrap();
    assert_eq!(location, format!("/v1/listings/{id}"));

    let response = app.send(get(&location)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["listing"]["district"], "Cayo");
    assert_eq!(body["listing"]["property_status"], "Available");

    let response = app
        .send(json_request(
            "PATCH",
            &location,
            Some(&token),
            &json!({ "price": 175000.0 }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["listing"]["price"], 175000.0);

    let response = app
        .send(json_request(
            "PATCH",
            &location,
            Some(&token),
            &json!({ "price": -1.0 }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(response).await["error"]["price"],
        "must be zero or more"
    );
}

#[tokio::test]
async fn listing_validation_reports_fields() {
    let app = test_app();
    let (_, token) = app.user_with_token("writer", true, &[LISTINGS_WRITE]).await;
    let response = app
        .send(json_request(
            "POST",
            "/v1/listings",
            Some(&token),
            &json!({ "property_title": "Tiny", "price": 10.0 }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["property_title"], "must be at least 20 bytes long");
    assert!(body["error"]["google_map_url"].is_string());
}

#[tokio::test]
async fn listing_page_metadata() {
    let app = test_app();
    app.seed_listings(&[
        "Beach house one near Placencia",
        "Beach house two near Placencia",
        "Beach house three near Placencia",
        "Beach house four near Placencia",
        "Beach house five near Placencia",
    ])
    .await;

    let response = app.send(get("/v1/listings?page=1&page_size=2")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["listings"].as_array().unwrap().len(), 2);
    assert_eq!(body["metadata"]["current_page"], 1);
    assert_eq!(body["metadata"]["page_size"], 2);
    assert_eq!(body["metadata"]["first_page"], 1);
    assert_eq!(body["metadata"]["last_page"], 3);
    assert_eq!(body["metadata"]["total_records"], 5);

    let response = app
        .send(get("/v1/listings?page=3&page_size=2&sort=-price"))
        .await;
    let body = body_json(response).await;
    let rows = body["listings"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["price"], 10000.0);
}

#[tokio::test]
async fn listing_search_filters_by_title() {
    let app = test_app();
    app.seed_listings(&[
        "Beach house near Placencia village",
        "Farm land on the Hummingbird Highway",
    ])
    .await;

    let response = app.send(get("/v1/listings?property_title=hummingbird")).await;
    let body = body_json(response).await;
    assert_eq!(body["listings"].as_array().unwrap().len(), 1);

    let response = app.send(get("/v1/listings?property_title=castle")).await;
    let body = body_json(response).await;
    assert!(body["listings"].as_array().unwrap().is_empty());
    assert_eq!(body["metadata"], json!({}));
}

#[tokio::test]
async fn bad_sort_is_a_validation_error() {
    let app = test_app();
    let response = app
        .send(get("/v1/listings?sort=password_hash&page_size=500"))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["sort"], "invalid sort value");
    assert_eq!(body["error"]["page_size"], "must be a maximum of 100");
}

#[tokio::test]
async fn non_numeric_id_is_not_found() {
    let app = test_app();
    let response = app.send(get("/v1/listings/abc")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = app.send(get("/v1/listings/9999")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn images_attach_to_listing() {
    let app = test_app();
    let (_, token) = app.user_with_token("writer", true, &[LISTINGS_WRITE]).await;
    app.seed_listings(&["Beach house near Placencia village"]).await;

    let response = app
        .send(multipart_request("POST", "/v1/listings/1/images", &token, &[]))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"]["images"], "must contain at least 1 file");

    let response = app
        .send(multipart_request(
            "POST",
            "/v1/listings/9999/images",
            &token,
            &[("images", Some("a.jpg"), &b"a"[..])],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(multipart_request(
            "POST",
            "/v1/listings/1/images",
            &token,
            &[
                ("images", Some("a.jpg"), &b"front"[..]),
                ("images", Some("b.jpg"), &b"back"[..]),
            ],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let paths: Vec<String> = body["listing_images"]["image_urls"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap().to_owned())
        .collect();
    assert_eq!(paths.len(), 2);

    let response = app.send(get(&paths[1])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"back");

    let body = body_json(app.send(get("/v1/listings/1")).await).await;
    assert_eq!(body["listing"]["images"].as_array().unwrap().len(), 2);
}

// -- Agents & Reports -----------------------------------------------------

#[tokio::test]
async fn agent_assignment_and_reports() {
    let app = test_app();
    let (agent, token) = app
        .user_with_token("agent", true, &[LISTINGS_WRITE, REPORTS_READ])
        .await;
    app.seed_listings(&[
        "Beach house near Placencia village",
        "Farm land on the Hummingbird Highway",
    ])
    .await;

    for listing_id in [1, 2] {
        let response = app
            .send(json_request(
                "POST",
                "/v1/agents/listings",
                Some(&token),
                &json!({ "username": "agent", "listing_id": listing_id }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .send(get(&format!("/v1/agents/{}/listings", agent.id)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["agent_listings"]["total"], 2);
    assert_eq!(body["agent_listings"]["listing_ids"], json!([1, 2]));

    let response = app
        .send(json_request(
            "PATCH",
            "/v1/listings/2",
            Some(&token),
            &json!({ "property_status_id": 2 }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(app.send(get_as("/v1/reports/total-sales", &token)).await).await;
    assert_eq!(body["sales"]["total_sales"], 20000.0);

    let body = body_json(app.send(get_as("/v1/reports/listing-status", &token)).await).await;
    assert_eq!(body["listing_status"]["sold_leased"], 1);
    assert_eq!(body["listing_status"]["available"], 1);

    let body = body_json(app.send(get_as("/v1/reports/top-agents", &token)).await).await;
    assert_eq!(body["top_agents"][0]["agent_name"], "agent Fullname");
}

#[tokio::test]
async fn reports_need_their_own_grant() {
    let app = test_app();
    let (_, token) = app.user_with_token("writer", true, &[LISTINGS_WRITE]).await;
    let response = app.send(get_as("/v1/reports/top-agents", &token)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// -- Rate Limiting --------------------------------------------------------

fn limited_config(trusted_proxies: Vec<std::net::IpAddr>) -> Config {
    Config {
        limiter_enabled: true,
        limiter_rps: 1.0,
        limiter_burst: 2,
        trusted_proxies,
        ..Config::default()
    }
}

fn health_from(peer: &str, forwarded_for: Option<&str>) -> Request<Body> {
    let peer: SocketAddr = peer.parse().unwrap();
    let mut builder = Request::builder()
        .uri("/v1/healthcheck")
        .extension(ConnectInfo(peer));
    if let Some(ip) = forwarded_for {
        builder = builder.header("x-forwarded-for", ip);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn burst_then_429() {
    let app = test_app_with(limited_config(Vec::new()));

    assert_eq!(app.send(health_from("203.0.113.9:1000", None)).await.status(), StatusCode::OK);
    assert_eq!(app.send(health_from("203.0.113.9:1001", None)).await.status(), StatusCode::OK);
    let response = app.send(health_from("203.0.113.9:1002", None)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(response).await["error"], "rate limit exceeded");

    assert_eq!(app.send(health_from("198.51.100.2:1000", None)).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn forged_forwarded_for_does_not_buy_new_buckets() {
    let app = test_app_with(limited_config(Vec::new()));

    let mut admitted = 0;
    for i in 0..50 {
        let forged = format!("198.51.100.{i}");
        let response = app.send(health_from("192.0.2.50:40000", Some(&forged))).await;
        if response.status() == StatusCode::OK {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 2);
    assert_eq!(app.state.limiter.tracked(), 1);
}

#[tokio::test]
async fn trusted_proxy_forwards_client_addresses() {
    let app = test_app_with(limited_config(vec!["10.0.0.1".parse().unwrap()]));
    let via_proxy = |client: &str| health_from("10.0.0.1:443", Some(client));

    assert_eq!(app.send(via_proxy("203.0.113.9")).await.status(), StatusCode::OK);
    assert_eq!(app.send(via_proxy("203.0.113.9")).await.status(), StatusCode::OK);
    assert_eq!(
        app.send(via_proxy("203.0.113.9")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(app.send(via_proxy("198.51.100.2")).await.status(), StatusCode::OK);
    assert_eq!(app.state.limiter.tracked(), 2);
}

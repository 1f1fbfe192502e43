//! # Listings
//!
//! Reads are public. Creating, editing and attaching images need
//! `listings:write`.
//!
//! `GET /v1/listings` accepts `property_title` and `district_id` as
//! full-text terms (empty matches everything), plus `page`, `page_size` and
//! `sort` from the listing allow-list.
//!
//! Images are uploaded as `multipart/form-data`, one or more files under
//! `images`.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use estate_core::listing::{
    Listing, ListingDetail, ListingImages, ListingQuery, ListingUpdate, NewListing,
};
use estate_core::permissions::LISTINGS_WRITE;
use estate_core::{Metadata, Validator};
use serde::Serialize;

use crate::auth::gates::protect;
use crate::auth::{Gate, Guard};
use crate::error::AppError;
use crate::extractors::{extract_json, validate, IdParam, QueryParams};
use crate::state::AppState;
use crate::uploads::{read_files, MAX_UPLOAD_BYTES};

/// Form field carrying listing image files.
pub const LISTING_IMAGES_FIELD: &str = "images";

#[derive(Debug, Serialize)]
pub struct ListingEnvelope<T> {
    pub listing: T,
}

#[derive(Debug, Serialize)]
pub struct ListingPage {
    pub listings: Vec<ListingDetail>,
    pub metadata: Metadata,
}

#[derive(Debug, Serialize)]
pub struct ListingImagesEnvelope {
    pub listing_images: AttachedImages,
}

#[derive(Debug, Serialize)]
pub struct AttachedImages {
    pub listing_id: i64,
    pub image_urls: Vec<String>,
}

pub fn router(state: &AppState) -> Router<AppState> {
    let writer = || Gate::new(state, Guard::permission(LISTINGS_WRITE));
    Router::new()
        .route(
            "/v1/listings",
            get(list_listings).merge(protect(post(create_listing), writer())),
        )
        .route(
            "/v1/listings/{id}",
            get(show_listing).merge(protect(patch(update_listing), writer())),
        )
        .route(
            "/v1/listings/{id}/images",
            protect(
                post(add_listing_images).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
                writer(),
            ),
        )
}

/// Build a validated search from the query string.
pub fn parse_listing_query(qs: &QueryParams) -> Result<ListingQuery, AppError> {
    let mut v = Validator::new();
    let mut query = ListingQuery::new();
    query.property_title = qs.read_string("property_title", "");
    query.district = qs.read_string("district_id", "");
    query.filters.page = qs.read_int("page", 1, &mut v);
    query.filters.page_size = qs.read_int("page_size", 20, &mut v);
    query.filters.sort = qs.read_string("sort", "id");

    estate_core::listing::validate_listing_query(&mut v, &query);
    v.finish()?;
    Ok(query)
}

/// GET /v1/listings
async fn list_listings(
    State(state): State<AppState>,
    qs: QueryParams,
) -> Result<Json<ListingPage>, AppError> {
    let query = parse_listing_query(&qs)?;
    let (listings, metadata) = state.models.listings.search_listings(&query).await?;
    Ok(Json(ListingPage { listings, metadata }))
}

/// POST /v1/listings
async fn create_listing(
    State(state): State<AppState>,
    body: Result<Json<NewListing>, JsonRejection>,
) -> Result<(StatusCode, HeaderMap, Json<ListingEnvelope<Listing>>), AppError> {
    let mut listing = extract_json(body)?.into_listing();
    validate(&listing)?;

    state.models.listings.insert_listing(&mut listing).await?;
    tracing::info!(listing_id = listing.id, "listing created");

    let mut headers = HeaderMap::new();
    let location = HeaderValue::from_str(&format!("/v1/listings/{}", listing.id))
        .map_err(|e| AppError::Internal(e.to_string()))?;
    headers.insert(header::LOCATION, location);
    Ok((StatusCode::CREATED, headers, Json(ListingEnvelope { listing })))
}

/// GET /v1/listings/{id}
async fn show_listing(
    State(state): State<AppState>,
    IdParam(id): IdParam,
) -> Result<Json<ListingEnvelope<ListingDetail>>, AppError> {
    let listing = state.models.listings.listing_detail(id).await?;
    Ok(Json(ListingEnvelope { listing }))
}

/// PATCH /v1/listings/{id}
async fn update_listing(
    State(state): State<AppState>,
    IdParam(id): IdParam,
    body: Result<Json<ListingUpdate>, JsonRejection>,
) -> Result<Json<ListingEnvelope<Listing>>, AppError> {
    let mut listing = state.models.listings.listing(id).await?;
    let update = extract_json(body)?;
    update.apply(&mut listing);
    validate(&listing)?;

    state.models.listings.update_listing(&mut listing).await?;
    Ok(Json(ListingEnvelope { listing }))
}

/// POST /v1/listings/{id}/images
async fn add_listing_images(
    State(state): State<AppState>,
    IdParam(id): IdParam,
    form: Result<Multipart, MultipartRejection>,
) -> Result<Json<ListingImagesEnvelope>, AppError> {
    let files = read_files(form, LISTING_IMAGES_FIELD).await?;
    validate(&ListingImages {
        file_names: files.iter().map(|f| f.file_name.clone()).collect(),
    })?;
    state.models.listings.listing(id).await?;

    let mut image_urls = Vec::with_capacity(files.len());
    for file in files {
        let path = state
            .uploads
            .store(&file.file_name, file.bytes)
            .await
            .map_err(|e| e.for_field(LISTING_IMAGES_FIELD))?;
        image_urls.push(path);
    }
    state.models.listings.add_images(id, &image_urls).await?;
    tracing::info!(listing_id = id, count = image_urls.len(), "listing images attached");

    Ok(Json(ListingImagesEnvelope {
        listing_images: AttachedImages {
            listing_id: id,
            image_urls,
        },
    }))
}

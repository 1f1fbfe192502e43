//! # Listings
//!
//! Write model ([`Listing`]), read model ([`ListingDetail`]), partial update
//! ([`ListingUpdate`]) and the search parameters for the list endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filters::{self, Filters};
use crate::validator::Validator;

/// Sort expressions accepted by `GET /v1/listings`.
pub const LISTING_SORT_SAFELIST: &[&str] = &[
    "id",
    "property_title",
    "district_id",
    "price",
    "-id",
    "-property_title",
    "-district_id",
    "-price",
];

/// Minimum title length in bytes.
pub const MIN_TITLE_BYTES: usize = 20;
/// Minimum description length in bytes.
pub const MIN_DESCRIPTION_BYTES: usize = 20;
/// Minimum address length in bytes.
pub const MIN_ADDRESS_BYTES: usize = 10;

/// A listing as written by an agent; references are by id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    pub id: i64,
    pub property_title: String,
    pub property_status_id: i64,
    pub property_type_id: i64,
    pub price: f64,
    pub description: String,
    pub address: String,
    pub district_id: i64,
    pub google_map_url: String,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    pub version: i32,
}

/// Body of `POST /v1/listings`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewListing {
    #[serde(default)]
    pub property_title: String,
    #[serde(default)]
    pub property_status_id: i64,
    #[serde(default)]
    pub property_type_id: i64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub district_id: i64,
    #[serde(default)]
    pub google_map_url: String,
}

impl NewListing {
    /// Build an unsaved listing (id 0, version 1).
    pub fn into_listing(self) -> Listing {
        Listing {
            id: 0,
            property_title: self.property_title,
            property_status_id: self.property_status_id,
            property_type_id: self.property_type_id,
            price: self.price,
            description: self.description,
            address: self.address,
            district_id: self.district_id,
            google_map_url: self.google_map_url,
            created_at: Utc::now(),
            version: 1,
        }
    }
}

/// Body of `PATCH /v1/listings/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListingUpdate {
    pub property_title: Option<String>,
    pub property_status_id: Option<i64>,
    pub property_type_id: Option<i64>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub district_id: Option<i64>,
    pub google_map_url: Option<String>,
}

impl ListingUpdate {
    pub fn apply(self, listing: &mut Listing) {
        if let Some(v) = self.property_title {
            listing.property_title = v;
        }
        if let Some(v) = self.property_status_id {
            listing.property_status_id = v;
        }
        if let Some(v) = self.property_type_id {
            listing.property_type_id = v;
        }
        if let Some(v) = self.price {
            listing.price = v;
        }
        if let Some(v) = self.description {
            listing.description = v;
        }
        if let Some(v) = self.address {
            listing.address = v;
        }
        if let Some(v) = self.district_id {
            listing.district_id = v;
        }
        if let Some(v) = self.google_map_url {
            listing.google_map_url = v;
        }
    }
}

pub fn validate_listing(v: &mut Validator, listing: &Listing) {
    v.check(
        !listing.property_title.is_empty(),
        "property_title",
        "must be provided",
    );
    v.check(
        listing.property_title.len() >= MIN_TITLE_BYTES,
        "property_title",
        "must be at least 20 bytes long",
    );

    v.check(
        listing.property_status_id > 0,
        "property_status_id",
        "must be provided",
    );
    v.check(
        listing.property_type_id > 0,
        "property_type_id",
        "must be provided",
    );

    v.check(
        listing.price.is_finite() && listing.price >= 0.0,
        "price",
        "must be zero or more",
    );

    v.check(
        !listing.description.is_empty(),
        "description",
        "must be provided",
    );
    v.check(
        listing.description.len() >= MIN_DESCRIPTION_BYTES,
        "description",
        "must be at least 20 bytes long",
    );

    v.check(!listing.address.is_empty(), "address", "must be provided");
    v.check(
        listing.address.len() >= MIN_ADDRESS_BYTES,
        "address",
        "must be at least 10 bytes long",
    );

    v.check(listing.district_id > 0, "district_id", "must be provided");
    v.check(
        !listing.google_map_url.is_empty(),
        "google_map_url",
        "must be provided",
    );
}

/// A listing as shown to clients: references resolved to names, images and
/// the assigned agent's contact details attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingDetail {
    pub id: i64,
    pub property_title: String,
    pub property_status: String,
    pub property_type: String,
    pub price: f64,
    pub description: String,
    pub address: String,
    pub district: String,
    pub google_map_url: String,
    pub images: Vec<String>,
    pub agent: Option<String>,
    pub agent_phone: Option<String>,
    pub agent_email: Option<String>,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
}

/// Files posted to `POST /v1/listings/{id}/images`, by client file name.
#[derive(Debug, Clone, Default)]
pub struct ListingImages {
    pub file_names: Vec<String>,
}

pub fn validate_listing_images(v: &mut Validator, images: &ListingImages) {
    v.check(
        !images.file_names.is_empty(),
        "images",
        "must contain at least 1 file",
    );
    v.check(
        images.file_names.iter().all(|name| !name.trim().is_empty()),
        "images",
        "every file must have a name",
    );
}

/// Search parameters for `GET /v1/listings`.
///
/// Empty terms match everything.
#[derive(Debug, Clone)]
pub struct ListingQuery {
    pub property_title: String,
    pub district: String,
    pub filters: Filters,
}

impl ListingQuery {
    pub fn new() -> Self {
        Self {
            property_title: String::new(),
            district: String::new(),
            filters: Filters::new(LISTING_SORT_SAFELIST),
        }
    }
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_listing_query(v: &mut Validator, query: &ListingQuery) {
    filters::validate_filters(v, &query.filters);
}

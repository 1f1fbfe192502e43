//! # estate-core: Domain Types for the Listing Platform
//!
//! Everything in this crate is pure: no sockets, no database handles, no
//! clocks beyond `chrono::Utc::now()` for token expiry. The HTTP service in
//! `estate-api` composes these pieces into request handlers.
//!
//! ## Modules
//!
//! - [`validator`]: accumulates field-level validation errors.
//! - [`password`]: salted adaptive password hashing (Argon2id).
//! - [`token`]: opaque bearer tokens: generation, digest, format checks.
//! - [`identity`]: the `Identity = Anonymous | Authenticated(User)` model.
//! - [`permissions`]: granted capability codes.
//! - [`filters`]: page/sort validation, sort resolution, pagination metadata.
//! - [`listing`], [`agent`], [`report`]: listing-platform value types.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `estate-*` crates.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod agent;
pub mod error;
pub mod filters;
pub mod identity;
pub mod listing;
pub mod password;
pub mod permissions;
pub mod report;
pub mod token;
pub mod validator;

pub use error::{CredentialError, TokenError, UnsafeSort};
pub use filters::{Filters, Metadata, SortClause, SortDirection};
pub use identity::{Identity, User};
pub use password::Password;
pub use permissions::Permissions;
pub use token::{Token, TokenScope};
pub use validator::{FieldErrors, Validator};

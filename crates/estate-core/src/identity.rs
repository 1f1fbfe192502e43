//! # Identity
//!
//! A request is made either by nobody in particular or by a stored user.
//! `Identity` models that directly instead of a sentinel "anonymous user"
//! record, so callers match on the variant rather than compare pointers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::password::{self, Password};
use crate::validator::{self, Validator, EMAIL_RX, PHONE_RX};

/// Maximum username length in bytes.
pub const MAX_USERNAME_BYTES: usize = 200;
/// Maximum full name length in bytes.
pub const MAX_FULLNAME_BYTES: usize = 500;
/// Maximum postal address length in bytes.
pub const MAX_ADDRESS_BYTES: usize = 500;

/// A registered platform user.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub fullname: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub district_id: i64,
    pub user_type_id: i64,
    pub profile_image_url: Option<String>,
    pub activated: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub version: i32,
    #[serde(skip)]
    pub password: Password,
}

/// Who is making a request.
#[derive(Debug, Clone)]
pub enum Identity {
    /// No `Authorization` header was sent.
    Anonymous,
    /// A bearer token resolved to this user.
    Authenticated(User),
}

impl Identity {
    /// Whether the request carries no credentials.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// The authenticated user, if any.
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(user) => Some(user),
        }
    }

    /// Consume into the authenticated user, if any.
    pub fn into_user(self) -> Option<User> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(user) => Some(user),
        }
    }
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(
        validator::matches(email, &EMAIL_RX),
        "email",
        "must be a valid email address",
    );
}

/// Registration and profile rules for a user record.
///
/// Password length rules run only while the plaintext is still held, i.e. on
/// a credential freshly produced by [`Password::set`].
pub fn validate_user(v: &mut Validator, user: &User) {
    v.check(!user.username.is_empty(), "username", "must be provided");
    v.check(
        user.username.len() <= MAX_USERNAME_BYTES,
        "username",
        "must not be more than 200 bytes long",
    );

    v.check(!user.fullname.is_empty(), "fullname", "must be provided");
    v.check(
        user.fullname.len() <= MAX_FULLNAME_BYTES,
        "fullname",
        "must not be more than 500 bytes long",
    );

    v.check(!user.phone.is_empty(), "phone", "must be provided");
    v.check(
        validator::matches(&user.phone, &PHONE_RX),
        "phone",
        "must be a valid phone number",
    );

    v.check(!user.address.is_empty(), "address", "must be provided");
    v.check(
        user.address.len() <= MAX_ADDRESS_BYTES,
        "address",
        "must not be more than 500 bytes long",
    );

    v.check(user.district_id > 0, "district_id", "must be provided");
    v.check(user.user_type_id > 0, "user_type_id", "must be provided");

    validate_email(v, &user.email);

    if let Some(plaintext) = user.password.plaintext() {
        password::validate_plaintext(v, plaintext);
    }
    v.check(user.password.is_set(), "password", "must be provided");
}

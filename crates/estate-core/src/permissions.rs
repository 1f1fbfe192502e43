//! Capability codes granted to users.

use std::collections::BTreeSet;

use serde::Serialize;

/// Read listings. Granted to every new registration.
pub const LISTINGS_READ: &str = "listings:read";
/// Create and edit listings, attach images, assign agents.
pub const LISTINGS_WRITE: &str = "listings:write";
/// View aggregate sales reports.
pub const REPORTS_READ: &str = "reports:read";

/// The set of capability codes a user holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Permissions(BTreeSet<String>);

impl Permissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `code` is granted.
    pub fn includes(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    pub fn insert(&mut self, code: impl Into<String>) {
        self.0.insert(code.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Permissions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

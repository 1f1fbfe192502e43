//! # Authentication & Authorization
//!
//! Three pieces, applied in this order to every request:
//!
//! 1. [`authenticate`] resolves the bearer token (if any) into an
//!    [`Identity`](estate_core::Identity) and stores it in the request
//!    extensions.
//! 2. [`gates`] evaluates a route's ordered list of stages (authenticated,
//!    activated, holds a permission) against that identity.
//! 3. Handlers read the identity through the [`CurrentIdentity`] and
//!    [`AuthenticatedUser`] extractors.
//!
//! [`credentials`] owns token issuance and lookup, and password hashing.

pub mod authenticate;
pub mod credentials;
pub mod gates;

pub use authenticate::{authenticate, AuthenticatedUser, CurrentIdentity};
pub use credentials::CredentialStore;
pub use gates::{Gate, Guard, Stage};

//! # Error Types
//!
//! Errors raised by the pure domain layer. All use `thiserror`; the API
//! crate maps them onto HTTP responses.

use thiserror::Error;

/// Failure while creating or checking a password credential.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// The supplied plaintext is empty and cannot be hashed.
    #[error("password must not be empty")]
    WeakInput,

    /// The stored hash is not a valid PHC string.
    #[error("malformed password hash: {0}")]
    MalformedHash(String),

    /// The hashing primitive itself failed (parameter or salt error).
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Failure while generating a token.
#[derive(Error, Debug)]
pub enum TokenError {
    /// The operating system random source was unavailable.
    #[error("failed to read secure random bytes: {0}")]
    Entropy(String),
}

/// A sort expression outside the endpoint's allow-list reached query
/// construction. Validation is supposed to reject these first.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsafe sort parameter: {0}")]
pub struct UnsafeSort(pub String);

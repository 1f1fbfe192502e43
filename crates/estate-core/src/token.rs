//! # Bearer Tokens
//!
//! Tokens are 16 bytes from the OS CSPRNG, base32-encoded (RFC 4648
//! alphabet, no padding) into a 26-character plaintext. Only the SHA-256
//! digest of the plaintext is ever persisted; the plaintext is returned to
//! the client once and then forgotten.

use chrono::{DateTime, Duration, Utc};
use data_encoding::BASE32_NOPAD;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::TokenError;
use crate::validator::Validator;

/// Random bytes per token.
pub const TOKEN_ENTROPY_BYTES: usize = 16;
/// Length of the base32 plaintext for [`TOKEN_ENTROPY_BYTES`] of entropy.
pub const TOKEN_PLAINTEXT_LEN: usize = 26;

/// Symbols of the RFC 4648 base32 alphabet.
const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenScope {
    /// Confirms ownership of the registration email address.
    Activation,
    /// Authenticates API requests.
    Authentication,
}

impl TokenScope {
    /// Value stored in the `scope` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activation => "activation",
            Self::Authentication => "authentication",
        }
    }

    /// Default lifetime of a freshly issued token.
    pub fn default_ttl(&self) -> Duration {
        match self {
            Self::Activation => Duration::days(3),
            Self::Authentication => Duration::hours(24),
        }
    }
}

impl std::fmt::Display for TokenScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SHA-256 digest of a token plaintext.
pub type TokenHash = [u8; 32];

/// An issued token.
///
/// Serializes as `{"token": "...", "expiry": "..."}`; hash, owner and scope
/// never leave the server.
#[derive(Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub hash: TokenHash,
    #[serde(skip)]
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    #[serde(skip)]
    pub scope: TokenScope,
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("plaintext", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .field("expiry", &self.expiry)
            .field("scope", &self.scope)
            .finish()
    }
}

impl Token {
    /// Generate a token for `user_id` that expires `ttl` from now.
    pub fn generate(user_id: i64, ttl: Duration, scope: TokenScope) -> Result<Self, TokenError> {
        let mut random = [0u8; TOKEN_ENTROPY_BYTES];
        OsRng
            .try_fill_bytes(&mut random)
            .map_err(|e| TokenError::Entropy(e.to_string()))?;
        let plaintext = BASE32_NOPAD.encode(&random);
        let hash = hash_plaintext(&plaintext);
        Ok(Self {
            plaintext,
            hash,
            user_id,
            expiry: Utc::now() + ttl,
            scope,
        })
    }
}

/// One-way digest used as the token's storage key.
pub fn hash_plaintext(plaintext: &str) -> TokenHash {
    Sha256::digest(plaintext.as_bytes()).into()
}

/// Whether `plaintext` has the shape of an issued token.
pub fn is_well_formed(plaintext: &str) -> bool {
    plaintext.len() == TOKEN_PLAINTEXT_LEN
        && plaintext.bytes().all(|b| BASE32_ALPHABET.contains(&b))
}

/// Record a `token` field error unless `plaintext` is well formed.
pub fn validate_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(is_well_formed(plaintext), "token", "must be 26 bytes long");
}

//! Password credentials hashed with Argon2id.
//!
//! The plaintext is kept (zeroized on drop) only on a freshly set credential
//! so registration can run length checks on it; credentials loaded from
//! storage carry the PHC hash alone.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;

use crate::error::CredentialError;
use crate::validator::Validator;

/// Argon2 memory cost in KiB.
const MEMORY_COST_KIB: u32 = 19_456;
/// Argon2 iteration count.
const TIME_COST: u32 = 2;
/// Argon2 lanes.
const PARALLELISM: u32 = 1;

/// Minimum accepted password length in bytes.
pub const MIN_PASSWORD_BYTES: usize = 8;
/// Maximum accepted password length in bytes.
pub const MAX_PASSWORD_BYTES: usize = 72;

fn hasher() -> Result<Argon2<'static>, CredentialError> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
        .map_err(|e| CredentialError::Hashing(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// A stored password credential.
#[derive(Clone, Default)]
pub struct Password {
    plaintext: Option<Zeroizing<String>>,
    hash: String,
}

impl Password {
    /// Hash `plaintext` with a fresh salt.
    ///
    /// Fails with [`CredentialError::WeakInput`] on an empty plaintext.
    pub fn set(plaintext: &str) -> Result<Self, CredentialError> {
        if plaintext.is_empty() {
            return Err(CredentialError::WeakInput);
        }
        let salt = SaltString::generate(&mut OsRng);
        let hash = hasher()?
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?
            .to_string();
        Ok(Self {
            plaintext: Some(Zeroizing::new(plaintext.to_owned())),
            hash,
        })
    }

    /// Wrap a hash read back from storage.
    pub fn from_hash(hash: impl Into<String>) -> Self {
        Self {
            plaintext: None,
            hash: hash.into(),
        }
    }

    /// Check `plaintext` against the stored hash.
    ///
    /// A mismatch is `Ok(false)`; only an unparseable stored hash is an error.
    /// The comparison inside `argon2` is constant-time.
    pub fn matches(&self, plaintext: &str) -> Result<bool, CredentialError> {
        let parsed = PasswordHash::new(&self.hash)
            .map_err(|e| CredentialError::MalformedHash(e.to_string()))?;
        match hasher()?.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CredentialError::MalformedHash(e.to_string())),
        }
    }

    /// The PHC-formatted hash string.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// The plaintext, present only on a credential created with [`Password::set`].
    pub fn plaintext(&self) -> Option<&str> {
        self.plaintext.as_deref().map(String::as_str)
    }

    /// Whether a hash is present.
    pub fn is_set(&self) -> bool {
        !self.hash.is_empty()
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password")
            .field("plaintext", &self.plaintext.as_ref().map(|_| "[REDACTED]"))
            .field("hash", &"[REDACTED]")
            .finish()
    }
}

/// Length rules for a client-supplied password.
pub fn validate_plaintext(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(
        password.len() >= MIN_PASSWORD_BYTES,
        "password",
        "must be at least 8 bytes long",
    );
    v.check(
        password.len() <= MAX_PASSWORD_BYTES,
        "password",
        "must not be more than 72 bytes long",
    );
}

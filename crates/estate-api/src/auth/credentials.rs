//! # Credential Store
//!
//! Issues, resolves and revokes bearer tokens on top of the user and token
//! stores, and runs the CPU-heavy password hashing off the async runtime.
//!
//! Resolution looks tokens up by digest, scope and expiry together, so a
//! wrong token, an expired token and a token of another scope all produce
//! the same [`StoreError::NotFound`].

use std::sync::Arc;

use chrono::Duration;
use estate_core::{token, Password, Token, TokenScope, User};

use crate::error::AppError;
use crate::store::{StoreError, TokenStore, UserStore};

#[derive(Clone)]
pub struct CredentialStore {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn TokenStore>,
}

impl CredentialStore {
    pub fn new(users: Arc<dyn UserStore>, tokens: Arc<dyn TokenStore>) -> Self {
        Self { users, tokens }
    }

    /// Generate and persist a token; the returned value carries the
    /// plaintext, which is not kept anywhere else.
    pub async fn issue_token(
        &self,
        user_id: i64,
        ttl: Duration,
        scope: TokenScope,
    ) -> Result<Token, AppError> {
        let token = Token::generate(user_id, ttl, scope)?;
        self.tokens.insert_token(&token).await?;
        Ok(token)
    }

    /// The user owning an unexpired `scope` token with this plaintext.
    pub async fn consume(&self, scope: TokenScope, plaintext: &str) -> Result<User, StoreError> {
        let hash = token::hash_plaintext(plaintext);
        self.users.user_for_token(scope, &hash).await
    }

    /// Delete every `scope` token belonging to `user_id`.
    pub async fn revoke_all(&self, scope: TokenScope, user_id: i64) -> Result<u64, StoreError> {
        self.tokens.delete_all_for_user(scope, user_id).await
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

/// Hash a new password on the blocking pool.
pub async fn hash_password(plaintext: String) -> Result<Password, AppError> {
    let password = tokio::task::spawn_blocking(move || Password::set(&plaintext)).await??;
    Ok(password)
}

/// Verify `plaintext` against `password` on the blocking pool.
pub async fn verify_password(password: Password, plaintext: String) -> Result<bool, AppError> {
    let matched = tokio::task::spawn_blocking(move || password.matches(&plaintext)).await??;
    Ok(matched)
}

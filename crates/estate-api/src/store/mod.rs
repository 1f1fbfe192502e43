//! # Persistence Interfaces
//!
//! Handlers talk to storage only through the traits below. Two backends
//! implement them: [`crate::db::PgStore`] (Postgres via sqlx) and
//! [`memory::MemoryStore`] (used when no database is configured, and by the
//! test suite).

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use estate_core::agent::{AgentAssignment, ListingsByAgent};
use estate_core::listing::{Listing, ListingDetail, ListingQuery};
use estate_core::report::{ListingStatusSummary, TopAgent, TotalSales};
use estate_core::token::TokenHash;
use estate_core::{Metadata, Permissions, Token, TokenScope, User};
use thiserror::Error;

use crate::db::PgStore;
use memory::MemoryStore;

#[derive(Error, Debug)]
pub enum StoreError {
    /// No row matched. Also covers expired and wrong-scope tokens.
    #[error("record not found")]
    NotFound,

    #[error("duplicate email")]
    DuplicateEmail,

    #[error("duplicate username")]
    DuplicateUsername,

    /// A foreign key pointed at a missing row; carries the request field name.
    #[error("unknown reference: {0}")]
    UnknownReference(&'static str),

    /// The row changed since it was read.
    #[error("edit conflict")]
    EditConflict,

    #[error("database call timed out")]
    Timeout,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The caller broke a precondition (e.g. an unvalidated sort key).
    #[error("store contract violated: {0}")]
    Contract(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert `user`, filling in `id`, `created_at` and `version`.
    async fn insert_user(&self, user: &mut User) -> Result<(), StoreError>;

    async fn user_by_id(&self, id: i64) -> Result<User, StoreError>;

    async fn user_by_username(&self, username: &str) -> Result<User, StoreError>;

    /// Write back `user` if its `version` still matches, then bump it.
    async fn update_user(&self, user: &mut User) -> Result<(), StoreError>;

    /// The owner of an unexpired token with this hash and scope.
    async fn user_for_token(&self, scope: TokenScope, hash: &TokenHash)
        -> Result<User, StoreError>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert_token(&self, token: &Token) -> Result<(), StoreError>;

    /// Delete every `scope` token owned by `user_id`; returns how many went.
    async fn delete_all_for_user(&self, scope: TokenScope, user_id: i64)
        -> Result<u64, StoreError>;
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Granted codes; empty for a user with no grants.
    async fn permissions_for(&self, user_id: i64) -> Result<Permissions, StoreError>;

    async fn grant(&self, user_id: i64, codes: &[&str]) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn insert_listing(&self, listing: &mut Listing) -> Result<(), StoreError>;

    async fn listing(&self, id: i64) -> Result<Listing, StoreError>;

    async fn listing_detail(&self, id: i64) -> Result<ListingDetail, StoreError>;

    async fn update_listing(&self, listing: &mut Listing) -> Result<(), StoreError>;

    /// One page of matches plus pagination metadata for the whole match set.
    async fn search_listings(
        &self,
        query: &ListingQuery,
    ) -> Result<(Vec<ListingDetail>, Metadata), StoreError>;

    async fn add_images(&self, listing_id: i64, urls: &[String]) -> Result<(), StoreError>;

    /// Make the user named in `assignment` the listing's agent.
    async fn assign_agent(&self, assignment: &AgentAssignment) -> Result<(), StoreError>;

    async fn listings_by_agent(&self, user_id: i64) -> Result<ListingsByAgent, StoreError>;
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn top_agents(&self) -> Result<Vec<TopAgent>, StoreError>;

    async fn listing_status(&self) -> Result<ListingStatusSummary, StoreError>;

    async fn total_sales(&self) -> Result<TotalSales, StoreError>;
}

/// The set of stores a request handler can reach.
#[derive(Clone)]
pub struct Models {
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub permissions: Arc<dyn PermissionStore>,
    pub listings: Arc<dyn ListingStore>,
    pub reports: Arc<dyn ReportStore>,
}

impl Models {
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            tokens: store.clone(),
            permissions: store.clone(),
            listings: store.clone(),
            reports: store,
        }
    }

    pub fn postgres(store: PgStore) -> Self {
        let store = Arc::new(store);
        Self {
            users: store.clone(),
            tokens: store.clone(),
            permissions: store.clone(),
            listings: store.clone(),
            reports: store,
        }
    }
}

impl std::fmt::Debug for Models {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Models").finish_non_exhaustive()
    }
}

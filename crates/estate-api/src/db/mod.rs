//! # Database Persistence Layer
//!
//! Postgres persistence via SQLx. The schema lives in `migrations/` and is
//! embedded and applied at startup. The per-table modules expose free
//! functions over `&PgPool`; [`PgStore`] wraps them in the store traits,
//! bounds every call with the configured timeout, and classifies driver
//! errors into [`StoreError`].

pub mod agents;
pub mod listings;
pub mod permissions;
pub mod reports;
pub mod tokens;
pub mod users;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use estate_core::agent::{AgentAssignment, ListingsByAgent};
use estate_core::listing::{Listing, ListingDetail, ListingQuery};
use estate_core::report::{ListingStatusSummary, TopAgent, TotalSales};
use estate_core::token::TokenHash;
use estate_core::{Metadata, Permissions, Token, TokenScope, User};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::store::{
    ListingStore, PermissionStore, ReportStore, StoreError, TokenStore, UserStore,
};

/// Connect, then run embedded migrations.
pub async fn init_pool(
    url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(url)
        .await?;
    tracing::info!("connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    Ok(pool)
}

/// Map a driver error onto the store taxonomy.
fn classify(err: sqlx::Error) -> StoreError {
    let mapped = match &err {
        sqlx::Error::RowNotFound => Some(StoreError::NotFound),
        sqlx::Error::Database(db) => match db.constraint() {
            Some("users_email_key") => Some(StoreError::DuplicateEmail),
            Some("users_username_key") => Some(StoreError::DuplicateUsername),
            Some(constraint) if db.is_foreign_key_violation() => {
                reference_field(constraint).map(StoreError::UnknownReference)
            }
            _ => None,
        },
        _ => None,
    };
    mapped.unwrap_or(StoreError::Database(err))
}

/// Request field behind a `<table>_<column>_fkey` constraint.
fn reference_field(constraint: &str) -> Option<&'static str> {
    const FIELDS: &[&str] = &[
        "property_status_id",
        "property_type_id",
        "district_id",
        "user_type_id",
        "listing_id",
        "user_id",
    ];
    FIELDS
        .iter()
        .copied()
        .find(|field| constraint.ends_with(&format!("_{field}_fkey")))
}

/// Postgres-backed implementation of every store trait.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn timed<T>(
        &self,
        call: impl Future<Output = Result<T, sqlx::Error>> + Send,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(classify),
            Err(_) => Err(StoreError::Timeout),
        }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: &mut User) -> Result<(), StoreError> {
        let (id, created_at, version) = self.timed(users::insert(&self.pool, user)).await?;
        user.id = id;
        user.created_at = created_at;
        user.version = version;
        Ok(())
    }

    async fn user_by_id(&self, id: i64) -> Result<User, StoreError> {
        self.timed(users::get_by_id(&self.pool, id))
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn user_by_username(&self, username: &str) -> Result<User, StoreError> {
        self.timed(users::get_by_username(&self.pool, username))
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn update_user(&self, user: &mut User) -> Result<(), StoreError> {
        let version = self
            .timed(users::update(&self.pool, user))
            .await?
            .ok_or(StoreError::EditConflict)?;
        user.version = version;
        Ok(())
    }

    async fn user_for_token(
        &self,
        scope: TokenScope,
        hash: &TokenHash,
    ) -> Result<User, StoreError> {
        self.timed(users::get_for_token(&self.pool, scope, hash))
            .await?
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn insert_token(&self, token: &Token) -> Result<(), StoreError> {
        self.timed(tokens::insert(&self.pool, token)).await
    }

    async fn delete_all_for_user(
        &self,
        scope: TokenScope,
        user_id: i64,
    ) -> Result<u64, StoreError> {
        self.timed(tokens::delete_all_for_user(&self.pool, scope, user_id))
            .await
    }
}

#[async_trait]
impl PermissionStore for PgStore {
    async fn permissions_for(&self, user_id: i64) -> Result<Permissions, StoreError> {
        self.timed(permissions::get_all_for_user(&self.pool, user_id))
            .await
    }

    async fn grant(&self, user_id: i64, codes: &[&str]) -> Result<(), StoreError> {
        self.timed(permissions::add_for_user(&self.pool, user_id, codes))
            .await
    }
}

#[async_trait]
impl ListingStore for PgStore {
    async fn insert_listing(&self, listing: &mut Listing) -> Result<(), StoreError> {
        let (id, created_at, version) = self.timed(listings::insert(&self.pool, listing)).await?;
        listing.id = id;
        listing.created_at = created_at;
        listing.version = version;
        Ok(())
    }

    async fn listing(&self, id: i64) -> Result<Listing, StoreError> {
        self.timed(listings::get(&self.pool, id))
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn listing_detail(&self, id: i64) -> Result<ListingDetail, StoreError> {
        self.timed(listings::get_detail(&self.pool, id))
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn update_listing(&self, listing: &mut Listing) -> Result<(), StoreError> {
        let version = self
            .timed(listings::update(&self.pool, listing))
            .await?
            .ok_or(StoreError::EditConflict)?;
        listing.version = version;
        Ok(())
    }

    async fn search_listings(
        &self,
        query: &ListingQuery,
    ) -> Result<(Vec<ListingDetail>, Metadata), StoreError> {
        let sort = query
            .filters
            .sort_clause()
            .map_err(|e| StoreError::Contract(e.to_string()))?;
        self.timed(listings::search(&self.pool, query, &sort)).await
    }

    async fn add_images(&self, listing_id: i64, urls: &[String]) -> Result<(), StoreError> {
        let inserted = self
            .timed(listings::add_images(&self.pool, listing_id, urls))
            .await?;
        if inserted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn assign_agent(&self, assignment: &AgentAssignment) -> Result<(), StoreError> {
        self.timed(agents::assign(&self.pool, assignment))
            .await?
            .ok_or(StoreError::NotFound)
            .map(|_| ())
    }

    async fn listings_by_agent(&self, user_id: i64) -> Result<ListingsByAgent, StoreError> {
        self.timed(agents::listings_by_agent(&self.pool, user_id))
            .await?
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl ReportStore for PgStore {
    async fn top_agents(&self) -> Result<Vec<TopAgent>, StoreError> {
        self.timed(reports::top_agents(&self.pool)).await
    }

    async fn listing_status(&self) -> Result<ListingStatusSummary, StoreError> {
        self.timed(reports::listing_status(&self.pool)).await
    }

    async fn total_sales(&self) -> Result<TotalSales, StoreError> {
        self.timed(reports::total_sales(&self.pool)).await
    }
}

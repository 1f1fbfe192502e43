//! In-memory backend.
//!
//! Holds everything behind one `parking_lot::RwLock`. Reference data
//! (districts, property statuses and types, user types) is seeded with the
//! same rows the Postgres migration inserts. Full-text predicates follow
//! `plainto_tsquery('simple', ..)`: the text is split on non-alphanumerics,
//! lowercased, and every query term must be present.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use estate_core::agent::{AgentAssignment, ListingsByAgent};
use estate_core::listing::{Listing, ListingDetail, ListingQuery};
use estate_core::report::{self, ListingStatusSummary, TopAgent, TotalSales, TOP_AGENTS_LIMIT};
use estate_core::token::TokenHash;
use estate_core::{Metadata, Permissions, SortDirection, Token, TokenScope, User};
use parking_lot::RwLock;
use subtle::ConstantTimeEq;

use super::{ListingStore, PermissionStore, ReportStore, StoreError, TokenStore, UserStore};

pub const DISTRICTS: &[(i64, &str)] = &[
    (1, "Belize"),
    (2, "Cayo"),
    (3, "Corozal"),
    (4, "Orange Walk"),
    (5, "Stann Creek"),
    (6, "Toledo"),
];

pub const PROPERTY_STATUSES: &[(i64, &str)] = &[(1, "Available"), (2, "Sold"), (3, "Leased")];

pub const PROPERTY_TYPES: &[(i64, &str)] = &[
    (1, "House"),
    (2, "Land"),
    (3, "Apartment"),
    (4, "Commercial"),
];

pub const USER_TYPES: &[(i64, &str)] = &[(1, "Admin"), (2, "Agent"), (3, "Client")];

/// A token as persisted: digest only.
#[derive(Debug, Clone)]
struct StoredToken {
    hash: TokenHash,
    user_id: i64,
    expiry: DateTime<Utc>,
    scope: TokenScope,
}

#[derive(Debug, Default)]
struct Inner {
    users: BTreeMap<i64, User>,
    tokens: Vec<StoredToken>,
    grants: HashMap<i64, Permissions>,
    listings: BTreeMap<i64, Listing>,
    images: HashMap<i64, Vec<String>>,
    /// listing id to agent user id
    agents: HashMap<i64, i64>,
    next_user_id: i64,
    next_listing_id: i64,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live and expired `scope` tokens held for `user_id`.
    pub fn token_count(&self, scope: TokenScope, user_id: i64) -> usize {
        self.inner
            .read()
            .tokens
            .iter()
            .filter(|t| t.scope == scope && t.user_id == user_id)
            .count()
    }
}

fn name_of(table: &'static [(i64, &'static str)], id: i64) -> Option<&'static str> {
    table
        .iter()
        .find(|(row_id, _)| *row_id == id)
        .map(|(_, name)| *name)
}

fn exists(table: &[(i64, &str)], id: i64) -> bool {
    table.iter().any(|(row_id, _)| *row_id == id)
}

fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Empty query matches everything.
fn text_matches(haystack: &str, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let wanted = terms(query);
    let have = terms(haystack);
    !wanted.is_empty() && wanted.iter().all(|w| have.contains(w))
}

fn check_listing_refs(listing: &Listing) -> Result<(), StoreError> {
    if !exists(PROPERTY_STATUSES, listing.property_status_id) {
        return Err(StoreError::UnknownReference("property_status_id"));
    }
    if !exists(PROPERTY_TYPES, listing.property_type_id) {
        return Err(StoreError::UnknownReference("property_type_id"));
    }
    if !exists(DISTRICTS, listing.district_id) {
        return Err(StoreError::UnknownReference("district_id"));
    }
    Ok(())
}

fn check_user_unique(inner: &Inner, user: &User) -> Result<(), StoreError> {
    let others = inner.users.values().filter(|u| u.id != user.id);
    for other in others {
        if other.email.eq_ignore_ascii_case(&user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        if other.username == user.username {
            return Err(StoreError::DuplicateUsername);
        }
    }
    if !exists(DISTRICTS, user.district_id) {
        return Err(StoreError::UnknownReference("district_id"));
    }
    if !exists(USER_TYPES, user.user_type_id) {
        return Err(StoreError::UnknownReference("user_type_id"));
    }
    Ok(())
}

impl Inner {
    fn detail(&self, listing: &Listing) -> ListingDetail {
        let agent = self
            .agents
            .get(&listing.id)
            .and_then(|user_id| self.users.get(user_id));
        ListingDetail {
            id: listing.id,
            property_title: listing.property_title.clone(),
            property_status: name_of(PROPERTY_STATUSES, listing.property_status_id)
                .unwrap_or_default()
                .to_owned(),
            property_type: name_of(PROPERTY_TYPES, listing.property_type_id)
                .unwrap_or_default()
                .to_owned(),
            price: listing.price,
            description: listing.description.clone(),
            address: listing.address.clone(),
            district: name_of(DISTRICTS, listing.district_id)
                .unwrap_or_default()
                .to_owned(),
            google_map_url: listing.google_map_url.clone(),
            images: self.images.get(&listing.id).cloned().unwrap_or_default(),
            agent: agent.map(|u| u.fullname.clone()),
            agent_phone: agent.map(|u| u.phone.clone()),
            agent_email: agent.map(|u| u.email.clone()),
            created_at: listing.created_at,
        }
    }

    fn status_name(&self, listing: &Listing) -> &'static str {
        name_of(PROPERTY_STATUSES, listing.property_status_id).unwrap_or_default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &mut User) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        user.id = 0;
        check_user_unique(&inner, user)?;
        inner.next_user_id += 1;
        user.id = inner.next_user_id;
        user.created_at = Utc::now();
        user.version = 1;
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn user_by_id(&self, id: i64) -> Result<User, StoreError> {
        self.inner
            .read()
            .users
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn user_by_username(&self, username: &str) -> Result<User, StoreError> {
        self.inner
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_user(&self, user: &mut User) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        match inner.users.get(&user.id) {
            Some(stored) if stored.version == user.version => {}
            _ => return Err(StoreError::EditConflict),
        }
        check_user_unique(&inner, user)?;
        user.version += 1;
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn user_for_token(
        &self,
        scope: TokenScope,
        hash: &TokenHash,
    ) -> Result<User, StoreError> {
        let inner = self.inner.read();
        let now = Utc::now();
        let owner = inner
            .tokens
            .iter()
            .find(|t| bool::from(t.hash[..].ct_eq(&hash[..])) && t.scope == scope && t.expiry > now)
            .map(|t| t.user_id)
            .ok_or(StoreError::NotFound)?;
        inner.users.get(&owner).cloned().ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert_token(&self, token: &Token) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if !inner.users.contains_key(&token.user_id) {
            return Err(StoreError::UnknownReference("user_id"));
        }
        inner.tokens.push(StoredToken {
            hash: token.hash,
            user_id: token.user_id,
            expiry: token.expiry,
            scope: token.scope,
        });
        Ok(())
    }

    async fn delete_all_for_user(
        &self,
        scope: TokenScope,
        user_id: i64,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.write();
        let before = inner.tokens.len();
        inner
            .tokens
            .retain(|t| !(t.scope == scope && t.user_id == user_id));
        Ok((before - inner.tokens.len()) as u64)
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn permissions_for(&self, user_id: i64) -> Result<Permissions, StoreError> {
        Ok(self
            .inner
            .read()
            .grants
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn grant(&self, user_id: i64, codes: &[&str]) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if !inner.users.contains_key(&user_id) {
            return Err(StoreError::UnknownReference("user_id"));
        }
        let granted = inner.grants.entry(user_id).or_default();
        for code in codes {
            granted.insert(*code);
        }
        Ok(())
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn insert_listing(&self, listing: &mut Listing) -> Result<(), StoreError> {
        check_listing_refs(listing)?;
        let mut inner = self.inner.write();
        inner.next_listing_id += 1;
        listing.id = inner.next_listing_id;
        listing.created_at = Utc::now();
        listing.version = 1;
        inner.listings.insert(listing.id, listing.clone());
        Ok(())
    }

    async fn listing(&self, id: i64) -> Result<Listing, StoreError> {
        self.inner
            .read()
            .listings
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn listing_detail(&self, id: i64) -> Result<ListingDetail, StoreError> {
        let inner = self.inner.read();
        let listing = inner.listings.get(&id).ok_or(StoreError::NotFound)?;
        Ok(inner.detail(listing))
    }

    async fn update_listing(&self, listing: &mut Listing) -> Result<(), StoreError> {
        check_listing_refs(listing)?;
        let mut inner = self.inner.write();
        match inner.listings.get(&listing.id) {
            Some(stored) if stored.version == listing.version => {}
            _ => return Err(StoreError::EditConflict),
        }
        listing.version += 1;
        inner.listings.insert(listing.id, listing.clone());
        Ok(())
    }

    async fn search_listings(
        &self,
        query: &ListingQuery,
    ) -> Result<(Vec<ListingDetail>, Metadata), StoreError> {
        let clause = query
            .filters
            .sort_clause()
            .map_err(|e| StoreError::Contract(e.to_string()))?;
        let by_column: fn(&Listing, &Listing) -> Ordering = match clause.column.as_str() {
            "id" => |a, b| a.id.cmp(&b.id),
            "property_title" => |a, b| a.property_title.cmp(&b.property_title),
            "district_id" => |a, b| a.district_id.cmp(&b.district_id),
            "price" => |a, b| a.price.total_cmp(&b.price),
            other => return Err(StoreError::Contract(format!("no sort column {other}"))),
        };

        let inner = self.inner.read();
        let mut matched: Vec<&Listing> = inner
            .listings
            .values()
            .filter(|l| text_matches(&l.property_title, &query.property_title))
            .filter(|l| {
                let district = name_of(DISTRICTS, l.district_id).unwrap_or_default();
                text_matches(district, &query.district)
            })
            .collect();
        matched.sort_by(|a, b| {
            let ord = by_column(a, b);
            let ord = match clause.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            ord.then(a.id.cmp(&b.id))
        });

        let total = matched.len() as i64;
        let offset = usize::try_from(query.filters.offset())
            .map_err(|_| StoreError::Contract("negative offset".into()))?;
        let limit = usize::try_from(query.filters.limit())
            .map_err(|_| StoreError::Contract("negative limit".into()))?;
        let page: Vec<ListingDetail> = matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|l| inner.detail(l))
            .collect();
        // The windowed count rides on the page rows, so an empty page has no total.
        let total = if page.is_empty() { 0 } else { total };
        let metadata = Metadata::calculate(total, query.filters.page, query.filters.page_size);
        Ok((page, metadata))
    }

    async fn add_images(&self, listing_id: i64, urls: &[String]) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if !inner.listings.contains_key(&listing_id) {
            return Err(StoreError::NotFound);
        }
        inner
            .images
            .entry(listing_id)
            .or_default()
            .extend(urls.iter().cloned());
        Ok(())
    }

    async fn assign_agent(&self, assignment: &AgentAssignment) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let user_id = inner
            .users
            .values()
            .find(|u| u.username == assignment.username)
            .map(|u| u.id)
            .ok_or(StoreError::NotFound)?;
        if !inner.listings.contains_key(&assignment.listing_id) {
            return Err(StoreError::UnknownReference("listing_id"));
        }
        inner.agents.insert(assignment.listing_id, user_id);
        Ok(())
    }

    async fn listings_by_agent(&self, user_id: i64) -> Result<ListingsByAgent, StoreError> {
        let inner = self.inner.read();
        let agent = inner.users.get(&user_id).ok_or(StoreError::NotFound)?;
        let mut listing_ids: Vec<i64> = inner
            .agents
            .iter()
            .filter(|(_, agent_id)| **agent_id == user_id)
            .map(|(listing_id, _)| *listing_id)
            .collect();
        if listing_ids.is_empty() {
            return Err(StoreError::NotFound);
        }
        listing_ids.sort_unstable();
        let property_titles = listing_ids
            .iter()
            .filter_map(|id| inner.listings.get(id))
            .map(|l| l.property_title.clone())
            .collect();
        Ok(ListingsByAgent {
            fullname: agent.fullname.clone(),
            property_titles,
            total: listing_ids.len() as i64,
            listing_ids,
        })
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn top_agents(&self) -> Result<Vec<TopAgent>, StoreError> {
        let inner = self.inner.read();
        let mut by_agent: BTreeMap<i64, TopAgent> = BTreeMap::new();
        for (listing_id, user_id) in &inner.agents {
            let (Some(listing), Some(agent)) =
                (inner.listings.get(listing_id), inner.users.get(user_id))
            else {
                continue;
            };
            if inner.status_name(listing) != "Sold" {
                continue;
            }
            let row = by_agent.entry(*user_id).or_insert_with(|| TopAgent {
                agent_name: agent.fullname.clone(),
                total_property_sold: 0,
                total_sales: 0.0,
            });
            row.total_property_sold += 1;
            row.total_sales += listing.price;
        }
        // BTreeMap iteration is by user id, so the stable sort breaks ties on it.
        let mut rows: Vec<TopAgent> = by_agent.into_values().collect();
        rows.sort_by(|a, b| b.total_sales.total_cmp(&a.total_sales));
        rows.truncate(TOP_AGENTS_LIMIT as usize);
        Ok(rows)
    }

    async fn listing_status(&self) -> Result<ListingStatusSummary, StoreError> {
        let inner = self.inner.read();
        let mut summary = ListingStatusSummary::default();
        for listing in inner.listings.values() {
            let status = inner.status_name(listing);
            if report::is_closed(status) {
                summary.sold_leased += 1;
            } else if status == report::AVAILABLE_STATUS {
                summary.available += 1;
            }
        }
        Ok(summary)
    }

    async fn total_sales(&self) -> Result<TotalSales, StoreError> {
        let inner = self.inner.read();
        let total_sales = inner
            .listings
            .values()
            .filter(|l| report::is_closed(inner.status_name(l)))
            .map(|l| l.price)
            .sum();
        Ok(TotalSales { total_sales })
    }
}

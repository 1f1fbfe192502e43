//! Listing persistence and the paginated listing search.
//!
//! Search runs as a single statement: `count(*) OVER()` carries the total
//! match count on every row, so pagination metadata needs no second query.
//! Title and district terms use `simple`-configuration full-text matching;
//! an empty term matches everything.

use chrono::{DateTime, Utc};
use estate_core::listing::{Listing, ListingDetail, ListingQuery};
use estate_core::{Metadata, SortClause};
use sqlx::PgPool;

/// Columns and joins shared by the detail and search queries.
const DETAIL_FROM: &str = "
    l.id, l.property_title, ps.name AS property_status, pt.name AS property_type,
    l.price, l.description, l.address, d.name AS district, l.google_map_url,
    COALESCE(img.urls, ARRAY[]::text[]) AS images,
    u.fullname AS agent, u.phone AS agent_phone, u.email AS agent_email,
    l.created_at
    FROM listings l
    INNER JOIN property_statuses ps ON ps.id = l.property_status_id
    INNER JOIN property_types pt ON pt.id = l.property_type_id
    INNER JOIN districts d ON d.id = l.district_id
    LEFT JOIN LATERAL (
        SELECT array_agg(i.image_url ORDER BY i.id) AS urls
        FROM listing_images i WHERE i.listing_id = l.id
    ) img ON true
    LEFT JOIN agent_listings al ON al.listing_id = l.id
    LEFT JOIN users u ON u.id = al.user_id";

#[derive(Debug, sqlx::FromRow)]
struct ListingRow {
    id: i64,
    property_title: String,
    property_status_id: i64,
    property_type_id: i64,
    price: f64,
    description: String,
    address: String,
    district_id: i64,
    google_map_url: String,
    created_at: DateTime<Utc>,
    version: i32,
}

impl ListingRow {
    fn into_listing(self) -> Listing {
        Listing {
            id: self.id,
            property_title: self.property_title,
            property_status_id: self.property_status_id,
            property_type_id: self.property_type_id,
            price: self.price,
            description: self.description,
            address: self.address,
            district_id: self.district_id,
            google_map_url: self.google_map_url,
            created_at: self.created_at,
            version: self.version,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DetailRow {
    id: i64,
    property_title: String,
    property_status: String,
    property_type: String,
    price: f64,
    description: String,
    address: String,
    district: String,
    google_map_url: String,
    images: Vec<String>,
    agent: Option<String>,
    agent_phone: Option<String>,
    agent_email: Option<String>,
    created_at: DateTime<Utc>,
}

impl DetailRow {
    fn into_detail(self) -> ListingDetail {
        ListingDetail {
            id: self.id,
            property_title: self.property_title,
            property_status: self.property_status,
            property_type: self.property_type,
            price: self.price,
            description: self.description,
            address: self.address,
            district: self.district,
            google_map_url: self.google_map_url,
            images: self.images,
            agent: self.agent,
            agent_phone: self.agent_phone,
            agent_email: self.agent_email,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SearchRow {
    total_records: i64,
    #[sqlx(flatten)]
    detail: DetailRow,
}

/// Insert a listing; returns the generated id, creation time and version.
pub async fn insert(
    pool: &PgPool,
    listing: &Listing,
) -> Result<(i64, DateTime<Utc>, i32), sqlx::Error> {
    sqlx::query_as(
        "INSERT INTO listings (property_title, property_status_id, property_type_id, price,
                               description, address, district_id, google_map_url)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING id, created_at, version",
    )
    .bind(&listing.property_title)
    .bind(listing.property_status_id)
    .bind(listing.property_type_id)
    .bind(listing.price)
    .bind(&listing.description)
    .bind(&listing.address)
    .bind(listing.district_id)
    .bind(&listing.google_map_url)
    .fetch_one(pool)
    .await
}

pub async fn get(pool: &PgPool, id: i64) -> Result<Option<Listing>, sqlx::Error> {
    let row = sqlx::query_as::<_, ListingRow>(
        "SELECT id, property_title, property_status_id, property_type_id, price, description,
                address, district_id, google_map_url, created_at, version
         FROM listings WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(ListingRow::into_listing))
}

pub async fn get_detail(pool: &PgPool, id: i64) -> Result<Option<ListingDetail>, sqlx::Error> {
    let sql = format!("SELECT {DETAIL_FROM} WHERE l.id = $1");
    let row = sqlx::query_as::<_, DetailRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(DetailRow::into_detail))
}

/// Returns the new version, or `None` on a version mismatch.
pub async fn update(pool: &PgPool, listing: &Listing) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar(
        "UPDATE listings
         SET property_title = $1, property_status_id = $2, property_type_id = $3, price = $4,
             description = $5, address = $6, district_id = $7, google_map_url = $8,
             version = version + 1
         WHERE id = $9 AND version = $10
         RETURNING version",
    )
    .bind(&listing.property_title)
    .bind(listing.property_status_id)
    .bind(listing.property_type_id)
    .bind(listing.price)
    .bind(&listing.description)
    .bind(&listing.address)
    .bind(listing.district_id)
    .bind(&listing.google_map_url)
    .bind(listing.id)
    .bind(listing.version)
    .fetch_optional(pool)
    .await
}

/// One page of listings matching `query`, ordered by `sort` then `l.id`.
///
/// `sort` must come from [`estate_core::Filters::sort_clause`], which only
/// yields allow-listed column names; it is spliced into the statement.
pub async fn search(
    pool: &PgPool,
    query: &ListingQuery,
    sort: &SortClause,
) -> Result<(Vec<ListingDetail>, Metadata), sqlx::Error> {
    let sql = format!(
        "SELECT count(*) OVER() AS total_records, {DETAIL_FROM}
         WHERE (to_tsvector('simple', l.property_title) @@ plainto_tsquery('simple', $1) OR $1 = '')
           AND (to_tsvector('simple', d.name) @@ plainto_tsquery('simple', $2) OR $2 = '')
         ORDER BY l.{column} {direction}, l.id ASC
         LIMIT $3 OFFSET $4",
        column = sort.column,
        direction = sort.direction.as_sql(),
    );

    let rows = sqlx::query_as::<_, SearchRow>(&sql)
        .bind(&query.property_title)
        .bind(&query.district)
        .bind(query.filters.limit())
        .bind(query.filters.offset())
        .fetch_all(pool)
        .await?;

    let total = rows.first().map_or(0, |row| row.total_records);
    let listings = rows.into_iter().map(|row| row.detail.into_detail()).collect();
    let metadata = Metadata::calculate(total, query.filters.page, query.filters.page_size);
    Ok((listings, metadata))
}

/// Attach image URLs; returns rows inserted (0 when the listing is missing).
pub async fn add_images(pool: &PgPool, listing_id: i64, urls: &[String]) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO listing_images (listing_id, image_url)
         SELECT $1, url FROM unnest($2::text[]) AS url
         WHERE EXISTS (SELECT 1 FROM listings WHERE id = $1)",
    )
    .bind(listing_id)
    .bind(urls)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

//! Aggregate sales reports.

use estate_core::report::{
    ListingStatusSummary, TopAgent, TotalSales, AVAILABLE_STATUS, CLOSED_STATUSES,
    TOP_AGENTS_LIMIT,
};
use sqlx::PgPool;

#[derive(Debug, sqlx::FromRow)]
struct TopAgentRow {
    agent_name: String,
    total_property_sold: i64,
    total_sales: f64,
}

/// Agents ranked by the value of their sold listings.
pub async fn top_agents(pool: &PgPool) -> Result<Vec<TopAgent>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TopAgentRow>(
        "SELECT u.fullname AS agent_name,
                count(l.id) AS total_property_sold,
                COALESCE(sum(l.price), 0)::float8 AS total_sales
         FROM users u
         INNER JOIN agent_listings al ON al.user_id = u.id
         INNER JOIN listings l ON l.id = al.listing_id
         INNER JOIN property_statuses ps ON ps.id = l.property_status_id
         WHERE ps.name = 'Sold'
         GROUP BY u.id, u.fullname
         ORDER BY total_sales DESC, u.id ASC
         LIMIT $1",
    )
    .bind(TOP_AGENTS_LIMIT)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| TopAgent {
            agent_name: r.agent_name,
            total_property_sold: r.total_property_sold,
            total_sales: r.total_sales,
        })
        .collect())
}

pub async fn listing_status(pool: &PgPool) -> Result<ListingStatusSummary, sqlx::Error> {
    let (sold_leased, available): (i64, i64) = sqlx::query_as(
        "SELECT count(*) FILTER (WHERE ps.name = ANY($1)) AS sold_leased,
                count(*) FILTER (WHERE ps.name = $2) AS available
         FROM listings l
         INNER JOIN property_statuses ps ON ps.id = l.property_status_id",
    )
    .bind(CLOSED_STATUSES)
    .bind(AVAILABLE_STATUS)
    .fetch_one(pool)
    .await?;
    Ok(ListingStatusSummary {
        sold_leased,
        available,
    })
}

pub async fn total_sales(pool: &PgPool) -> Result<TotalSales, sqlx::Error> {
    let total_sales: f64 = sqlx::query_scalar(
        "SELECT COALESCE(sum(l.price), 0)::float8
         FROM listings l
         INNER JOIN property_statuses ps ON ps.id = l.property_status_id
         WHERE ps.name = ANY($1)",
    )
    .bind(CLOSED_STATUSES)
    .fetch_one(pool)
    .await?;
    Ok(TotalSales { total_sales })
}

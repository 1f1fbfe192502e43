//! Agent to listing assignments (`agent_listings`).

use estate_core::agent::{AgentAssignment, ListingsByAgent};
use sqlx::PgPool;

/// Make the named user the listing's agent, replacing any previous one.
///
/// Returns the agent's id, or `None` if no user has that username.
pub async fn assign(pool: &PgPool, assignment: &AgentAssignment) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO agent_listings (user_id, listing_id)
         SELECT u.id, $2 FROM users u WHERE u.username = $1
         ON CONFLICT (listing_id) DO UPDATE SET user_id = EXCLUDED.user_id
         RETURNING user_id",
    )
    .bind(&assignment.username)
    .bind(assignment.listing_id)
    .fetch_optional(pool)
    .await
}

#[derive(Debug, sqlx::FromRow)]
struct ListingsByAgentRow {
    fullname: String,
    property_titles: Vec<String>,
    listing_ids: Vec<i64>,
    total: i64,
}

/// `None` when the user does not exist or has no listings.
pub async fn listings_by_agent(
    pool: &PgPool,
    user_id: i64,
) -> Result<Option<ListingsByAgent>, sqlx::Error> {
    let row = sqlx::query_as::<_, ListingsByAgentRow>(
        "SELECT u.fullname,
                array_agg(l.property_title ORDER BY l.id) AS property_titles,
                array_agg(l.id ORDER BY l.id) AS listing_ids,
                count(l.id) AS total
         FROM users u
         INNER JOIN agent_listings al ON al.user_id = u.id
         INNER JOIN listings l ON l.id = al.listing_id
         WHERE u.id = $1
         GROUP BY u.id, u.fullname",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| ListingsByAgent {
        fullname: r.fullname,
        property_titles: r.property_titles,
        listing_ids: r.listing_ids,
        total: r.total,
    }))
}

//! Aggregate sales report rows.

use serde::Serialize;

/// Status names that count as a completed sale.
pub const CLOSED_STATUSES: &[&str] = &["Sold", "Leased"];
/// Status name of a listing still on the market.
pub const AVAILABLE_STATUS: &str = "Available";
/// Number of rows in the top-agents report.
pub const TOP_AGENTS_LIMIT: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopAgent {
    pub agent_name: String,
    pub total_property_sold: i64,
    pub total_sales: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ListingStatusSummary {
    pub sold_leased: i64,
    pub available: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TotalSales {
    pub total_sales: f64,
}

/// Whether a listing in status `name` counts toward sales totals.
pub fn is_closed(name: &str) -> bool {
    CLOSED_STATUSES.contains(&name)
}

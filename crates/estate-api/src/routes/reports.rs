//! Sales reports. Every endpoint needs `reports:read`.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use estate_core::permissions::REPORTS_READ;
use estate_core::report::{ListingStatusSummary, TopAgent, TotalSales};
use serde::Serialize;

use crate::auth::gates::protect;
use crate::auth::{Gate, Guard};
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TopAgentsEnvelope {
    pub top_agents: Vec<TopAgent>,
}

#[derive(Debug, Serialize)]
pub struct ListingStatusEnvelope {
    pub listing_status: ListingStatusSummary,
}

#[derive(Debug, Serialize)]
pub struct SalesEnvelope {
    pub sales: TotalSales,
}

pub fn router(state: &AppState) -> Router<AppState> {
    let reader = || Gate::new(state, Guard::permission(REPORTS_READ));
    Router::new()
        .route("/v1/reports/top-agents", protect(get(top_agents), reader()))
        .route("/v1/reports/listing-status", protect(get(listing_status), reader()))
        .route("/v1/reports/total-sales", protect(get(total_sales), reader()))
}

/// GET /v1/reports/top-agents
async fn top_agents(State(state): State<AppState>) -> Result<Json<TopAgentsEnvelope>, AppError> {
    let top_agents = state.models.reports.top_agents().await?;
    Ok(Json(TopAgentsEnvelope { top_agents }))
}

/// GET /v1/reports/listing-status
async fn listing_status(
    State(state): State<AppState>,
) -> Result<Json<ListingStatusEnvelope>, AppError> {
    let listing_status = state.models.reports.listing_status().await?;
    Ok(Json(ListingStatusEnvelope { listing_status }))
}

/// GET /v1/reports/total-sales
async fn total_sales(State(state): State<AppState>) -> Result<Json<SalesEnvelope>, AppError> {
    let sales = state.models.reports.total_sales().await?;
    Ok(Json(SalesEnvelope { sales }))
}

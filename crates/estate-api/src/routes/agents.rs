//! Agent to listing assignments.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use estate_core::agent::{AgentAssignment, ListingsByAgent};
use estate_core::permissions::LISTINGS_WRITE;
use serde::Serialize;

use crate::auth::gates::protect;
use crate::auth::{Gate, Guard};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, IdParam};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AssignmentEnvelope {
    pub agent_listing: AgentAssignment,
}

#[derive(Debug, Serialize)]
pub struct AgentListingsEnvelope {
    pub agent_listings: ListingsByAgent,
}

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/v1/agents/listings",
            protect(
                post(assign_agent),
                Gate::new(state, Guard::permission(LISTINGS_WRITE)),
            ),
        )
        .route("/v1/agents/{id}/listings", get(listings_by_agent))
}

/// POST /v1/agents/listings
///
/// Reassigning a listing replaces its previous agent.
async fn assign_agent(
    State(state): State<AppState>,
    body: Result<Json<AgentAssignment>, JsonRejection>,
) -> Result<(StatusCode, Json<AssignmentEnvelope>), AppError> {
    let assignment = extract_validated_json(body)?;
    state.models.listings.assign_agent(&assignment).await?;
    tracing::info!(
        username = %assignment.username,
        listing_id = assignment.listing_id,
        "agent assigned"
    );
    Ok((
        StatusCode::CREATED,
        Json(AssignmentEnvelope {
            agent_listing: assignment,
        }),
    ))
}

/// GET /v1/agents/{id}/listings
async fn listings_by_agent(
    State(state): State<AppState>,
    IdParam(id): IdParam,
) -> Result<Json<AgentListingsEnvelope>, AppError> {
    let agent_listings = state.models.listings.listings_by_agent(id).await?;
    Ok(Json(AgentListingsEnvelope { agent_listings }))
}

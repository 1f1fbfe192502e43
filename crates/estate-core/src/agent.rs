//! Agent to listing assignments.

use serde::{Deserialize, Serialize};

use crate::validator::Validator;

/// Body of `POST /v1/agents/listings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentAssignment {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub listing_id: i64,
}

pub fn validate_assignment(v: &mut Validator, assignment: &AgentAssignment) {
    v.check(!assignment.username.is_empty(), "username", "must be provided");
    v.check(assignment.listing_id > 0, "listing_id", "must be provided");
}

/// Listings assigned to one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingsByAgent {
    pub fullname: String,
    pub property_titles: Vec<String>,
    pub listing_ids: Vec<i64>,
    pub total: i64,
}

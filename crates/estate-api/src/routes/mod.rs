//! # API Route Modules
//!
//! - `health`: liveness and build information.
//! - `users`: registration, activation, profile reads and profile images.
//! - `tokens`: login (authentication token issuance).
//! - `listings`: the public listing search and detail reads, and the
//!   `listings:write` create, update and image endpoints.
//! - `agents`: agent to listing assignment and per-agent listing summaries.
//! - `reports`: sales aggregates behind `reports:read`.

pub mod agents;
pub mod health;
pub mod listings;
pub mod reports;
pub mod tokens;
pub mod users;

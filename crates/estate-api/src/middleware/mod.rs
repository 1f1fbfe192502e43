//! Request pipeline layers, outermost first: panic recovery, rate limiting,
//! CORS. Authentication and the gate stages live in [`crate::auth`].

pub mod cors;
pub mod rate_limit;
pub mod recover;

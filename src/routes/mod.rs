//! Router Module Index
//!
//! Routes are split by the section of the site they serve. Access control is not
//! applied here: the access gate wraps the assembled router in `create_router`,
//! and handlers that need a role check it themselves.

/// Anonymous, read-only routes. Only published listings are exposed.
pub mod public;

/// `/dashboard/*`. Requires a session; admin and landlord sections are role-gated.
pub mod dashboard;

/// `/api/listings/*`. Requires a session; write handlers check roles and ownership.
pub mod api;

use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Dashboard Router Module
///
/// Nested under `/dashboard`. By the time a request gets here the gate has already
/// sent anonymous callers to sign-in and role mismatches to the renter dashboard.
pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(handlers::get_me))
        // Reachable by every signed-in role.
        .route("/renter", get(handlers::renter_dashboard))
        // LANDLORD only.
        .route("/landlord/listings", get(handlers::landlord_listings))
        // ADMIN only.
        .route("/admin/listings", get(handlers::admin_listings))
        .route("/admin/stats", get(handlers::admin_stats))
}

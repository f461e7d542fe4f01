use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints reachable without a session. Every listing query goes through the
/// published-only repository methods.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for the load balancer.
        .route("/health", get(|| async { "ok" }))
        // GET /listings?city=...&min_rent=...&status=...
        .route("/listings", get(handlers::list_listings))
        // GET /listings/{id}
        // Unpublished listings answer 404.
        .route("/listings/{id}", get(handlers::get_listing))
}

use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Listings API Router Module
///
/// JSON endpoints behind `/api/listings`. The gate only guarantees a session;
/// role and ownership rules are enforced in the handlers:
/// - create and image endpoints: LANDLORD or ADMIN
/// - update: owner only
/// - status: ADMIN only
/// - publish/hide: owner or ADMIN
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/listings", post(handlers::create_listing))
        .route("/api/listings/mine", get(handlers::my_listings))
        .route(
            "/api/listings/images",
            post(handlers::request_image_upload).delete(handlers::delete_image),
        )
        .route("/api/listings/{id}", put(handlers::update_listing))
        .route("/api/listings/{id}/status", put(handlers::set_listing_status))
        .route(
            "/api/listings/{id}/published",
            put(handlers::set_listing_published),
        )
}

use axum::{Router, extract::FromRef, http::HeaderName, middleware};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod admin;
pub mod auth;
pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod listing_status;
pub mod migrations;
pub mod models;
pub mod repository;
pub mod storage;

// Routers grouped by site section (public, dashboard, listings API).
pub mod routes;
use routes::{api, dashboard, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{MockImageStorage, S3ImageStorage, StorageState};

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_listings, handlers::get_listing, handlers::get_me,
        handlers::renter_dashboard, handlers::landlord_listings, handlers::admin_listings,
        handlers::admin_stats, handlers::create_listing, handlers::my_listings,
        handlers::update_listing, handlers::set_listing_status, handlers::set_listing_published,
        handlers::request_image_upload, handlers::delete_image
    ),
    components(
        schemas(
            models::Listing, models::PublicListing, models::CreateListingRequest,
            models::UpdateListingRequest, models::SetStatusRequest, models::SetPublishedRequest,
            models::ImageUploadRequest, models::ImageUploadResponse, models::DeleteImageRequest,
            models::UserProfile, models::DashboardStats, models::StatusCount,
            listing_status::ListingStatus, auth::Role, error::ErrorResponse,
        )
    ),
    tags(
        (name = "rental-portal", description = "Rental listings portal API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Shared, immutable container for the services every handler needs. Cloned per
/// request; the services themselves sit behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub storage: StorageState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles all routers, wraps them in the access gate and then in the
/// observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .nest("/dashboard", dashboard::dashboard_routes())
        .merge(api::api_routes())
        // `layer` (not `route_layer`) so unmatched protected paths are gated too.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            gate::access_gate,
        ))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for each request, carrying the `x-request-id` so every log line of one
/// request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}

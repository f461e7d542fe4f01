use crate::{
    AppState,
    auth::{AuthUser, Role, require_role},
    error::{AppError, AppResult, ErrorResponse},
    listing_status::ListingStatus,
    models::{
        CreateListingRequest, DashboardStats, DeleteImageRequest, ImageUploadRequest,
        ImageUploadResponse, Listing, ListingFilter, ListingQuery, NewListing, PublicListing,
        SetPublishedRequest, SetStatusRequest, UpdateListingRequest, UserProfile,
    },
    repository::StatusUpdate,
    storage::{
        IMAGE_KEY_PREFIX, ImageTransform, is_allowed_image_type, new_image_key, sanitize_key,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

/// Roles allowed to own listings.
const LISTING_OWNERS: [Role; 2] = [Role::Landlord, Role::Admin];

impl ListingFilter {
    /// Validates the raw query; an unknown status is a validation error.
    pub fn into_query(self) -> AppResult<ListingQuery> {
        let status = self
            .status
            .as_deref()
            .map(str::parse::<ListingStatus>)
            .transpose()?;

        Ok(ListingQuery {
            city: self.city.filter(|c| !c.trim().is_empty()),
            min_rent: self.min_rent,
            max_rent: self.max_rent,
            min_bedrooms: self.min_bedrooms,
            status,
        })
    }
}

fn to_public(
    state: &AppState,
    listings: Vec<Listing>,
    transform: Option<&ImageTransform>,
) -> Vec<PublicListing> {
    listings
        .into_iter()
        .map(|listing| PublicListing::from_listing(listing, state.storage.as_ref(), transform))
        .collect()
}

// --- Public Handlers ---

/// list_listings
///
/// [Public Route] Searches published listings. `width`/`height` resize the image URLs.
#[utoipa::path(
    get,
    path = "/listings",
    params(ListingFilter, ImageTransform),
    responses(
        (status = 200, description = "Published listings", body = [PublicListing]),
        (status = 400, description = "Invalid filter", body = ErrorResponse)
    )
)]
pub async fn list_listings(
    State(state): State<AppState>,
    Query(filter): Query<ListingFilter>,
    Query(transform): Query<ImageTransform>,
) -> AppResult<Json<Vec<PublicListing>>> {
    let query = filter.into_query()?;
    let listings = state.repo.list_published_listings(&query).await?;
    Ok(Json(to_public(&state, listings, Some(&transform))))
}

/// get_listing
///
/// [Public Route] One published listing. Unpublished listings are reported as missing.
#[utoipa::path(
    get,
    path = "/listings/{id}",
    params(("id" = Uuid, Path, description = "Listing ID"), ImageTransform),
    responses(
        (status = 200, description = "Found", body = PublicListing),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(transform): Query<ImageTransform>,
) -> AppResult<Json<PublicListing>> {
    let listing = state
        .repo
        .get_published_listing(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("listing {}", id)))?;
    Ok(Json(PublicListing::from_listing(
        listing,
        state.storage.as_ref(),
        Some(&transform),
    )))
}

// --- Dashboard Handlers ---

/// get_me
///
/// [Dashboard] Profile of the signed-in user.
#[utoipa::path(
    get,
    path = "/dashboard/me",
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn get_me(user: AuthUser, State(state): State<AppState>) -> AppResult<Json<UserProfile>> {
    let record = state
        .repo
        .get_user(user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("user".to_string()))?;

    // The role shown is the session's, which is what the gate acted on.
    Ok(Json(UserProfile {
        id: record.id,
        email: record.email,
        role: user.role,
        dashboard: user.role.dashboard_home().to_string(),
    }))
}

/// renter_dashboard
///
/// [Dashboard] Renter landing page data: published listings that are available.
/// Every signed-in role may reach it; it is where role mismatches are sent.
#[utoipa::path(
    get,
    path = "/dashboard/renter",
    responses((status = 200, description = "Available listings", body = [PublicListing]))
)]
pub async fn renter_dashboard(
    _user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<PublicListing>>> {
    let query = ListingQuery {
        status: Some(ListingStatus::Available),
        ..ListingQuery::default()
    };
    let listings = state.repo.list_published_listings(&query).await?;
    Ok(Json(to_public(&state, listings, None)))
}

/// landlord_listings
///
/// [Dashboard, LANDLORD] Every listing the landlord owns, published or not.
#[utoipa::path(
    get,
    path = "/dashboard/landlord/listings",
    responses((status = 200, description = "Own listings", body = [Listing]))
)]
pub async fn landlord_listings(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Listing>>> {
    Ok(Json(state.repo.list_owner_listings(user.id).await?))
}

/// admin_listings
///
/// [Dashboard, ADMIN] All listings regardless of publication or status.
#[utoipa::path(
    get,
    path = "/dashboard/admin/listings",
    responses((status = 200, description = "All listings", body = [Listing]))
)]
pub async fn admin_listings(
    _user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Listing>>> {
    Ok(Json(state.repo.list_all_listings().await?))
}

/// admin_stats
///
/// [Dashboard, ADMIN] Counters for the admin dashboard.
#[utoipa::path(
    get,
    path = "/dashboard/admin/stats",
    responses((status = 200, description = "Stats", body = DashboardStats))
)]
pub async fn admin_stats(
    _user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DashboardStats>> {
    Ok(Json(state.repo.get_stats().await?))
}

// --- Listing API Handlers ---

/// create_listing
///
/// [API, LANDLORD/ADMIN] Add-property flow. The new listing always starts AVAILABLE.
#[utoipa::path(
    post,
    path = "/api/listings",
    request_body = CreateListingRequest,
    responses(
        (status = 201, description = "Created", body = Listing),
        (status = 400, description = "Invalid payload", body = ErrorResponse)
    )
)]
pub async fn create_listing(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateListingRequest>,
) -> AppResult<(StatusCode, Json<Listing>)> {
    require_role(&user, &LISTING_OWNERS)?;
    payload.validate().map_err(AppError::Validation)?;

    let listing = state
        .repo
        .create_listing(NewListing::from_request(payload, user.id))
        .await?;

    tracing::info!(listing_id = %listing.id, owner_id = %user.id, "listing created");
    Ok((StatusCode::CREATED, Json(listing)))
}

/// my_listings
///
/// [API] Listings owned by the caller. Renters simply get an empty list.
#[utoipa::path(
    get,
    path = "/api/listings/mine",
    responses((status = 200, description = "Own listings", body = [Listing]))
)]
pub async fn my_listings(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Listing>>> {
    Ok(Json(state.repo.list_owner_listings(user.id).await?))
}

/// update_listing
///
/// [API] Owner-only partial update. Anyone else gets a 404.
#[utoipa::path(
    put,
    path = "/api/listings/{id}",
    params(("id" = Uuid, Path, description = "Listing ID")),
    request_body = UpdateListingRequest,
    responses(
        (status = 200, description = "Updated", body = Listing),
        (status = 404, description = "Not found or not owner", body = ErrorResponse)
    )
)]
pub async fn update_listing(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateListingRequest>,
) -> AppResult<Json<Listing>> {
    payload.validate().map_err(AppError::Validation)?;

    state
        .repo
        .update_listing(id, user.id, payload)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("listing {}", id)))
}

/// set_listing_status
///
/// [API, ADMIN] Moves a listing to any status. The value is parsed against the
/// closed set before the repository is touched; `published` is left alone.
#[utoipa::path(
    put,
    path = "/api/listings/{id}/status",
    params(("id" = Uuid, Path, description = "Listing ID")),
    request_body = SetStatusRequest,
    responses(
        (status = 200, description = "Updated", body = Listing),
        (status = 400, description = "Unknown status", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 409, description = "Version mismatch", body = ErrorResponse)
    )
)]
pub async fn set_listing_status(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetStatusRequest>,
) -> AppResult<Json<Listing>> {
    require_role(&user, &[Role::Admin])?;
    let status: ListingStatus = payload.status.parse()?;

    match state
        .repo
        .set_listing_status(id, status, payload.expected_version)
        .await?
    {
        StatusUpdate::Updated(listing) => {
            tracing::info!(listing_id = %id, %status, version = listing.version, "listing status set");
            Ok(Json(listing))
        }
        StatusUpdate::NotFound => Err(AppError::NotFound(format!("listing {}", id))),
        StatusUpdate::VersionConflict { current } => Err(AppError::Conflict(format!(
            "listing {} is at version {}",
            id, current
        ))),
    }
}

/// set_listing_published
///
/// [API, owner or ADMIN] Publishes or hides a listing without touching its status.
/// A non-owner gets the same 404 as for a missing listing.
#[utoipa::path(
    put,
    path = "/api/listings/{id}/published",
    params(("id" = Uuid, Path, description = "Listing ID")),
    request_body = SetPublishedRequest,
    responses(
        (status = 200, description = "Updated", body = Listing),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn set_listing_published(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetPublishedRequest>,
) -> AppResult<Json<Listing>> {
    let not_found = || AppError::NotFound(format!("listing {}", id));

    let listing = state.repo.get_listing(id).await?.ok_or_else(not_found)?;
    if user.role != Role::Admin && listing.owner_id != user.id {
        return Err(not_found());
    }

    state
        .repo
        .set_listing_published(id, payload.published)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

/// request_image_upload
///
/// [API, LANDLORD/ADMIN] Presigned URL for uploading one listing photo straight to
/// the image host.
#[utoipa::path(
    post,
    path = "/api/listings/images",
    request_body = ImageUploadRequest,
    responses(
        (status = 200, description = "Upload URL", body = ImageUploadResponse),
        (status = 400, description = "Unsupported content type", body = ErrorResponse),
        (status = 502, description = "Image host failure", body = ErrorResponse)
    )
)]
pub async fn request_image_upload(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ImageUploadRequest>,
) -> AppResult<Json<ImageUploadResponse>> {
    require_role(&user, &LISTING_OWNERS)?;
    if !is_allowed_image_type(&payload.content_type) {
        return Err(AppError::Validation(format!(
            "unsupported image type `{}`",
            payload.content_type
        )));
    }

    let image_key = new_image_key(&payload.filename);
    let upload_url = state
        .storage
        .presigned_upload_url(&image_key, &payload.content_type)
        .await?;

    Ok(Json(ImageUploadResponse {
        upload_url,
        public_url: state.storage.public_url(&image_key, None),
        image_key,
    }))
}

/// delete_image
///
/// [API, LANDLORD/ADMIN] Removes an uploaded photo from the image host.
#[utoipa::path(
    delete,
    path = "/api/listings/images",
    request_body = DeleteImageRequest,
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Key outside the listing image prefix", body = ErrorResponse),
        (status = 502, description = "Image host failure", body = ErrorResponse)
    )
)]
pub async fn delete_image(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<DeleteImageRequest>,
) -> AppResult<StatusCode> {
    require_role(&user, &LISTING_OWNERS)?;

    // Only canonical keys under the listing prefix; no `..` or empty segments.
    let key = sanitize_key(&payload.image_key);
    if key != payload.image_key || !key.starts_with(IMAGE_KEY_PREFIX) {
        return Err(AppError::Validation(format!(
            "`{}` is not a listing image key",
            payload.image_key
        )));
    }

    state.storage.delete_image(&key).await?;
    tracing::info!(image_key = %key, user_id = %user.id, "listing image deleted");
    Ok(StatusCode::NO_CONTENT)
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::Role,
    listing_status::ListingStatus,
    storage::{IMAGE_KEY_PREFIX, ImageStorage, ImageTransform},
};

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// A row of the `users` table. The bcrypt hash is never loaded into this struct.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Listing
///
/// A row of the `listings` table. Listings are never hard-deleted; they leave the
/// market through `published` and `status`, which are independent of each other.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Listing {
    pub id: Uuid,
    // FK to users.id (a landlord or an admin).
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub address: String,
    pub city: String,
    pub monthly_rent: i32,
    pub bedrooms: i32,
    pub bathrooms: i32,
    // Object keys on the image host.
    pub images: Vec<String>,
    pub published: bool,
    #[sqlx(try_from = "String")]
    pub status: ListingStatus,
    // Bumped on every status write.
    pub version: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// NewListing
///
/// The row inserted by the add-property flow. Status always starts at the default
/// (AVAILABLE); `published` is whatever the landlord asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct NewListing {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub address: String,
    pub city: String,
    pub monthly_rent: i32,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub images: Vec<String>,
    pub published: bool,
    pub status: ListingStatus,
}

impl NewListing {
    pub fn from_request(req: CreateListingRequest, owner_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            title: req.title.trim().to_string(),
            description: req.description,
            address: req.address,
            city: req.city.trim().to_string(),
            monthly_rent: req.monthly_rent,
            bedrooms: req.bedrooms,
            bathrooms: req.bathrooms,
            images: req.image_keys,
            published: req.published,
            status: ListingStatus::default(),
        }
    }
}

// --- Request Payloads (Input Schemas) ---

/// CreateListingRequest
///
/// Input payload for the add-property flow (POST /api/listings). Image keys come
/// from the presigned upload flow.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateListingRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub address: String,
    pub city: String,
    pub monthly_rent: i32,
    pub bedrooms: i32,
    pub bathrooms: i32,
    #[serde(default)]
    pub image_keys: Vec<String>,
    #[serde(default)]
    pub published: bool,
}

fn validate_image_keys(keys: &[String]) -> Result<(), String> {
    match keys.iter().find(|key| !key.starts_with(IMAGE_KEY_PREFIX) || key.contains("..")) {
        Some(key) => Err(format!("image key `{}` was not issued by the upload flow", key)),
        None => Ok(()),
    }
}

impl CreateListingRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        if self.address.trim().is_empty() {
            return Err("address must not be empty".to_string());
        }
        if self.city.trim().is_empty() {
            return Err("city must not be empty".to_string());
        }
        if self.monthly_rent < 0 {
            return Err("monthly_rent must not be negative".to_string());
        }
        if self.bedrooms < 0 || self.bathrooms < 0 {
            return Err("room counts must not be negative".to_string());
        }
        validate_image_keys(&self.image_keys)
    }
}

/// UpdateListingRequest
///
/// Partial update payload (PUT /api/listings/{id}). Absent fields keep their value.
/// Status and publication have their own endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateListingRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_rent: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_keys: Option<Vec<String>>,
}

impl UpdateListingRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err("title must not be empty".to_string());
        }
        if self.monthly_rent.is_some_and(|rent| rent < 0) {
            return Err("monthly_rent must not be negative".to_string());
        }
        if self.bedrooms.is_some_and(|n| n < 0) || self.bathrooms.is_some_and(|n| n < 0) {
            return Err("room counts must not be negative".to_string());
        }
        match &self.image_keys {
            Some(keys) => validate_image_keys(keys),
            None => Ok(()),
        }
    }
}

/// SetStatusRequest
///
/// Admin payload for PUT /api/listings/{id}/status. `status` stays a raw string so
/// out-of-set values are rejected by the handler before anything is written.
/// When `expected_version` is given the write only happens if the row still has
/// that version.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SetStatusRequest {
    #[schema(example = "RESERVED")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SetPublishedRequest {
    pub published: bool,
}

/// ListingFilter
///
/// Query parameters accepted by the public listing search (GET /listings).
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListingFilter {
    /// Case-insensitive substring match on the city.
    pub city: Option<String>,
    pub min_rent: Option<i32>,
    pub max_rent: Option<i32>,
    pub min_bedrooms: Option<i32>,
    /// One of the listing status values.
    pub status: Option<String>,
}

/// ListingQuery
///
/// `ListingFilter` after validation, as handed to the repository.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingQuery {
    pub city: Option<String>,
    pub min_rent: Option<i32>,
    pub max_rent: Option<i32>,
    pub min_bedrooms: Option<i32>,
    pub status: Option<ListingStatus>,
}

/// ImageUploadRequest
///
/// Input for POST /api/listings/images.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct ImageUploadRequest {
    /// Original filename, used to derive the extension.
    #[schema(example = "living_room.jpg")]
    pub filename: String,
    /// MIME type the upload is pinned to.
    #[schema(example = "image/jpeg")]
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct ImageUploadResponse {
    /// Time-limited URL for the PUT request.
    pub upload_url: String,
    /// Key to attach to the listing once the upload finished.
    pub image_key: String,
    pub public_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct DeleteImageRequest {
    pub image_key: String,
}

// --- Output Schemas ---

/// PublicListing
///
/// What the public pages render: resolved image URLs plus the availability line
/// derived from the status.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PublicListing {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub address: String,
    pub city: String,
    pub monthly_rent: i32,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub image_urls: Vec<String>,
    pub status: ListingStatus,
    pub availability: String,
}

impl PublicListing {
    /// `transform` is applied to every image URL, so a list page can ask for thumbnails.
    pub fn from_listing(
        listing: Listing,
        images: &dyn ImageStorage,
        transform: Option<&ImageTransform>,
    ) -> Self {
        let image_urls = listing
            .images
            .iter()
            .map(|key| images.public_url(key, transform))
            .collect();

        Self {
            id: listing.id,
            title: listing.title,
            description: listing.description,
            address: listing.address,
            city: listing.city,
            monthly_rent: listing.monthly_rent,
            bedrooms: listing.bedrooms,
            bathrooms: listing.bathrooms,
            image_urls,
            status: listing.status,
            availability: listing.status.availability_message().to_string(),
        }
    }
}

/// UserProfile
///
/// Output of GET /dashboard/me.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    /// Landing page of the user's dashboard section.
    pub dashboard: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct StatusCount {
    pub status: ListingStatus,
    pub count: i64,
}

/// DashboardStats
///
/// Output of GET /dashboard/admin/stats.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct DashboardStats {
    pub total_listings: i64,
    pub published_listings: i64,
    pub total_users: i64,
    pub by_status: Vec<StatusCount>,
}

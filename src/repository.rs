use crate::{
    listing_status::ListingStatus,
    models::{DashboardStats, Listing, ListingQuery, NewListing, StatusCount, UpdateListingRequest, User},
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

// Column list shared by every query returning a `Listing`.
macro_rules! listing_columns {
    () => {
        "id, owner_id, title, description, address, city, monthly_rent, bedrooms, bathrooms, \
         images, published, status, version, created_at, updated_at"
    };
}

/// Outcome of a status write.
#[derive(Debug, Clone)]
pub enum StatusUpdate {
    Updated(Listing),
    NotFound,
    /// `expected_version` was supplied and the row has moved on.
    VersionConflict { current: i32 },
}

/// Repository Trait
///
/// Every persistence operation the handlers need. Errors are returned as
/// `sqlx::Error` and surface to the caller; nothing here retries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, sqlx::Error>;

    // --- Listing Retrieval ---
    // Public search. Always restricted to published listings.
    async fn list_published_listings(&self, query: &ListingQuery) -> Result<Vec<Listing>, sqlx::Error>;
    // Any listing by id, published or not.
    async fn get_listing(&self, id: Uuid) -> Result<Option<Listing>, sqlx::Error>;
    async fn get_published_listing(&self, id: Uuid) -> Result<Option<Listing>, sqlx::Error>;
    // Admin dashboard: everything.
    async fn list_all_listings(&self) -> Result<Vec<Listing>, sqlx::Error>;
    async fn list_owner_listings(&self, owner_id: Uuid) -> Result<Vec<Listing>, sqlx::Error>;

    // --- Listing Writes ---
    async fn create_listing(&self, listing: NewListing) -> Result<Listing, sqlx::Error>;
    // Owner-only: matches nothing unless `owner_id` owns the row.
    async fn update_listing(
        &self,
        id: Uuid,
        owner_id: Uuid,
        req: UpdateListingRequest,
    ) -> Result<Option<Listing>, sqlx::Error>;
    // Does not touch `published`.
    async fn set_listing_status(
        &self,
        id: Uuid,
        status: ListingStatus,
        expected_version: Option<i32>,
    ) -> Result<StatusUpdate, sqlx::Error>;
    // Does not touch `status`.
    async fn set_listing_published(&self, id: Uuid, published: bool) -> Result<Option<Listing>, sqlx::Error>;

    async fn get_stats(&self) -> Result<DashboardStats, sqlx::Error>;
}

/// RepositoryState
///
/// The shared handle to the persistence layer held in `AppState`.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// `Repository` backed by the Postgres pool.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT id, email, role, created_at FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Builds the search with bound parameters only. `published = true` is part of
    /// the base query, not an optional filter.
    async fn list_published_listings(&self, query: &ListingQuery) -> Result<Vec<Listing>, sqlx::Error> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(concat!(
            "SELECT ",
            listing_columns!(),
            " FROM listings WHERE published = true"
        ));

        if let Some(city) = &query.city {
            builder.push(" AND city ILIKE ").push_bind(format!("%{}%", city));
        }
        if let Some(min) = query.min_rent {
            builder.push(" AND monthly_rent >= ").push_bind(min);
        }
        if let Some(max) = query.max_rent {
            builder.push(" AND monthly_rent <= ").push_bind(max);
        }
        if let Some(min) = query.min_bedrooms {
            builder.push(" AND bedrooms >= ").push_bind(min);
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }

        builder.push(" ORDER BY created_at DESC");

        builder
            .build_query_as::<Listing>()
            .fetch_all(&self.pool)
            .await
    }

    async fn get_listing(&self, id: Uuid) -> Result<Option<Listing>, sqlx::Error> {
        sqlx::query_as::<_, Listing>(concat!(
            "SELECT ",
            listing_columns!(),
            " FROM listings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_published_listing(&self, id: Uuid) -> Result<Option<Listing>, sqlx::Error> {
        sqlx::query_as::<_, Listing>(concat!(
            "SELECT ",
            listing_columns!(),
            " FROM listings WHERE id = $1 AND published = true"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_all_listings(&self) -> Result<Vec<Listing>, sqlx::Error> {
        sqlx::query_as::<_, Listing>(concat!(
            "SELECT ",
            listing_columns!(),
            " FROM listings ORDER BY published ASC, created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
    }

    async fn list_owner_listings(&self, owner_id: Uuid) -> Result<Vec<Listing>, sqlx::Error> {
        sqlx::query_as::<_, Listing>(concat!(
            "SELECT ",
            listing_columns!(),
            " FROM listings WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn create_listing(&self, listing: NewListing) -> Result<Listing, sqlx::Error> {
        sqlx::query_as::<_, Listing>(concat!(
            "INSERT INTO listings (id, owner_id, title, description, address, city, monthly_rent, \
             bedrooms, bathrooms, images, published, status, version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 1, NOW(), NOW()) \
             RETURNING ",
            listing_columns!()
        ))
        .bind(listing.id)
        .bind(listing.owner_id)
        .bind(listing.title)
        .bind(listing.description)
        .bind(listing.address)
        .bind(listing.city)
        .bind(listing.monthly_rent)
        .bind(listing.bedrooms)
        .bind(listing.bathrooms)
        .bind(listing.images)
        .bind(listing.published)
        .bind(listing.status.as_str())
        .fetch_one(&self.pool)
        .await
    }

    /// COALESCE keeps every column whose field in `req` is `None`.
    async fn update_listing(
        &self,
        id: Uuid,
        owner_id: Uuid,
        req: UpdateListingRequest,
    ) -> Result<Option<Listing>, sqlx::Error> {
        sqlx::query_as::<_, Listing>(concat!(
            "UPDATE listings \
             SET title = COALESCE($3, title), \
                 description = COALESCE($4, description), \
                 address = COALESCE($5, address), \
                 city = COALESCE($6, city), \
                 monthly_rent = COALESCE($7, monthly_rent), \
                 bedrooms = COALESCE($8, bedrooms), \
                 bathrooms = COALESCE($9, bathrooms), \
                 images = COALESCE($10, images), \
                 updated_at = NOW() \
             WHERE id = $1 AND owner_id = $2 \
             RETURNING ",
            listing_columns!()
        ))
        .bind(id)
        .bind(owner_id)
        .bind(req.title)
        .bind(req.description)
        .bind(req.address)
        .bind(req.city)
        .bind(req.monthly_rent)
        .bind(req.bedrooms)
        .bind(req.bathrooms)
        .bind(req.image_keys)
        .fetch_optional(&self.pool)
        .await
    }

    /// Single-row update. Without `expected_version` the last writer wins.
    async fn set_listing_status(
        &self,
        id: Uuid,
        status: ListingStatus,
        expected_version: Option<i32>,
    ) -> Result<StatusUpdate, sqlx::Error> {
        let updated = sqlx::query_as::<_, Listing>(concat!(
            "UPDATE listings \
             SET status = $2, version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND ($3::INT4 IS NULL OR version = $3) \
             RETURNING ",
            listing_columns!()
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(listing) = updated {
            return Ok(StatusUpdate::Updated(listing));
        }

        let current = sqlx::query_scalar::<_, i32>("SELECT version FROM listings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match current {
            Some(current) => StatusUpdate::VersionConflict { current },
            None => StatusUpdate::NotFound,
        })
    }

    async fn set_listing_published(&self, id: Uuid, published: bool) -> Result<Option<Listing>, sqlx::Error> {
        sqlx::query_as::<_, Listing>(concat!(
            "UPDATE listings SET published = $2, updated_at = NOW() WHERE id = $1 RETURNING ",
            listing_columns!()
        ))
        .bind(id)
        .bind(published)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_stats(&self) -> Result<DashboardStats, sqlx::Error> {
        let total_listings = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM listings")
            .fetch_one(&self.pool)
            .await?;
        let published_listings =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM listings WHERE published = true")
                .fetch_one(&self.pool)
                .await?;
        let total_users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM listings WHERE status IS NOT NULL GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let by_status = rows
            .into_iter()
            .filter_map(|(raw, count)| match raw.parse::<ListingStatus>() {
                Ok(status) => Some(StatusCount { status, count }),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unknown status in stats");
                    None
                }
            })
            .collect();

        Ok(DashboardStats {
            total_listings,
            published_listings,
            total_users,
            by_status,
        })
    }
}

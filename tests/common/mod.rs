#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use rental_portal::{
    AppConfig, AppState,
    auth::{Role, encode_session_token},
    listing_status::ListingStatus,
    models::{
        DashboardStats, Listing, ListingQuery, NewListing, StatusCount, UpdateListingRequest, User,
    },
    repository::{Repository, StatusUpdate},
    storage::MockImageStorage,
};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const LANDLORD_ID: Uuid = Uuid::from_u128(1);
pub const OTHER_LANDLORD_ID: Uuid = Uuid::from_u128(2);
pub const ADMIN_ID: Uuid = Uuid::from_u128(3);
pub const RENTER_ID: Uuid = Uuid::from_u128(4);

// --- In-memory Repository ---

/// The search filter the Postgres repository expresses in SQL, applied in memory.
pub fn matches_query(query: &ListingQuery, listing: &Listing) -> bool {
    let city_ok = query.city.as_deref().is_none_or(|city| {
        listing
            .city
            .to_lowercase()
            .contains(&city.to_lowercase())
    });
    city_ok
        && query.min_rent.is_none_or(|min| listing.monthly_rent >= min)
        && query.max_rent.is_none_or(|max| listing.monthly_rent <= max)
        && query.min_bedrooms.is_none_or(|min| listing.bedrooms >= min)
        && query.status.is_none_or(|status| listing.status == status)
}

#[derive(Default)]
pub struct MockState {
    pub users: Vec<User>,
    pub listings: Vec<Listing>,
    // Names of the trait methods called, in order.
    pub calls: Vec<&'static str>,
}

/// Behaves like the Postgres repository over in-memory rows.
#[derive(Default)]
pub struct MockRepository {
    pub state: Mutex<MockState>,
}

impl MockRepository {
    pub fn new(users: Vec<User>, listings: Vec<Listing>) -> Self {
        Self {
            state: Mutex::new(MockState {
                users,
                listings,
                calls: vec![],
            }),
        }
    }

    pub fn with_listings(listings: Vec<Listing>) -> Self {
        Self::new(default_users(), listings)
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn listing(&self, id: Uuid) -> Option<Listing> {
        self.state
            .lock()
            .unwrap()
            .listings
            .iter()
            .find(|l| l.id == id)
            .cloned()
    }

    fn record(&self, call: &'static str) -> std::sync::MutexGuard<'_, MockState> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        state
    }
}

#[async_trait]
impl Repository for MockRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        let state = self.record("get_user");
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn list_published_listings(&self, query: &ListingQuery) -> Result<Vec<Listing>, sqlx::Error> {
        let state = self.record("list_published_listings");
        Ok(state
            .listings
            .iter()
            .filter(|l| l.published && matches_query(query, l))
            .cloned()
            .collect())
    }

    async fn get_listing(&self, id: Uuid) -> Result<Option<Listing>, sqlx::Error> {
        let state = self.record("get_listing");
        Ok(state.listings.iter().find(|l| l.id == id).cloned())
    }

    async fn get_published_listing(&self, id: Uuid) -> Result<Option<Listing>, sqlx::Error> {
        let state = self.record("get_published_listing");
        Ok(state
            .listings
            .iter()
            .find(|l| l.id == id && l.published)
            .cloned())
    }

    async fn list_all_listings(&self) -> Result<Vec<Listing>, sqlx::Error> {
        let state = self.record("list_all_listings");
        Ok(state.listings.clone())
    }

    async fn list_owner_listings(&self, owner_id: Uuid) -> Result<Vec<Listing>, sqlx::Error> {
        let state = self.record("list_owner_listings");
        Ok(state
            .listings
            .iter()
            .filter(|l| l.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn create_listing(&self, new: NewListing) -> Result<Listing, sqlx::Error> {
        let mut state = self.record("create_listing");
        let now = Utc::now();
        let listing = Listing {
            id: new.id,
            owner_id: new.owner_id,
            title: new.title,
            description: new.description,
            address: new.address,
            city: new.city,
            monthly_rent: new.monthly_rent,
            bedrooms: new.bedrooms,
            bathrooms: new.bathrooms,
            images: new.images,
            published: new.published,
            status: new.status,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        state.listings.push(listing.clone());
        Ok(listing)
    }

    async fn update_listing(
        &self,
        id: Uuid,
        owner_id: Uuid,
        req: UpdateListingRequest,
    ) -> Result<Option<Listing>, sqlx::Error> {
        let mut state = self.record("update_listing");
        let Some(listing) = state
            .listings
            .iter_mut()
            .find(|l| l.id == id && l.owner_id == owner_id)
        else {
            return Ok(None);
        };

        if let Some(title) = req.title {
            listing.title = title;
        }
        if let Some(description) = req.description {
            listing.description = description;
        }
        if let Some(address) = req.address {
            listing.address = address;
        }
        if let Some(city) = req.city {
            listing.city = city;
        }
        if let Some(rent) = req.monthly_rent {
            listing.monthly_rent = rent;
        }
        if let Some(bedrooms) = req.bedrooms {
            listing.bedrooms = bedrooms;
        }
        if let Some(bathrooms) = req.bathrooms {
            listing.bathrooms = bathrooms;
        }
        if let Some(images) = req.image_keys {
            listing.images = images;
        }
        listing.updated_at = Utc::now();
        Ok(Some(listing.clone()))
    }

    async fn set_listing_status(
        &self,
        id: Uuid,
        status: ListingStatus,
        expected_version: Option<i32>,
    ) -> Result<StatusUpdate, sqlx::Error> {
        let mut state = self.record("set_listing_status");
        let Some(listing) = state.listings.iter_mut().find(|l| l.id == id) else {
            return Ok(StatusUpdate::NotFound);
        };

        if expected_version.is_some_and(|v| v != listing.version) {
            return Ok(StatusUpdate::VersionConflict {
                current: listing.version,
            });
        }

        listing.status = status;
        listing.version += 1;
        listing.updated_at = Utc::now();
        Ok(StatusUpdate::Updated(listing.clone()))
    }

    async fn set_listing_published(&self, id: Uuid, published: bool) -> Result<Option<Listing>, sqlx::Error> {
        let mut state = self.record("set_listing_published");
        Ok(state.listings.iter_mut().find(|l| l.id == id).map(|listing| {
            listing.published = published;
            listing.updated_at = Utc::now();
            listing.clone()
        }))
    }

    async fn get_stats(&self) -> Result<DashboardStats, sqlx::Error> {
        let state = self.record("get_stats");
        let by_status = ListingStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                count: state.listings.iter().filter(|l| l.status == status).count() as i64,
            })
            .filter(|c| c.count > 0)
            .collect();

        Ok(DashboardStats {
            total_listings: state.listings.len() as i64,
            published_listings: state.listings.iter().filter(|l| l.published).count() as i64,
            total_users: state.users.len() as i64,
            by_status,
        })
    }
}

// --- Fixtures ---

pub fn user(id: Uuid, email: &str, role: Role) -> User {
    User {
        id,
        email: email.to_string(),
        role,
        created_at: Utc::now(),
    }
}

pub fn default_users() -> Vec<User> {
    vec![
        user(LANDLORD_ID, "landlord@rental.test", Role::Landlord),
        user(OTHER_LANDLORD_ID, "other@rental.test", Role::Landlord),
        user(ADMIN_ID, "admin@rental.test", Role::Admin),
        user(RENTER_ID, "renter@rental.test", Role::Renter),
    ]
}

pub fn listing(owner_id: Uuid, city: &str, published: bool, status: ListingStatus) -> Listing {
    let now = Utc::now();
    Listing {
        id: Uuid::new_v4(),
        owner_id,
        title: format!("Flat in {}", city),
        description: "Two rooms, bright".to_string(),
        address: "1 Main Street".to_string(),
        city: city.to_string(),
        monthly_rent: 1200,
        bedrooms: 2,
        bathrooms: 1,
        images: vec!["listings/a.jpg".to_string()],
        published,
        status,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

// --- State and Session Helpers ---

/// AppState over the given repository. The returned handle lets a test inspect
/// the repository after the handler ran.
pub fn test_state(repo: MockRepository) -> (AppState, Arc<MockRepository>) {
    let repo = Arc::new(repo);
    let state = AppState {
        repo: repo.clone(),
        storage: Arc::new(MockImageStorage::new()),
        config: AppConfig::default(),
    };
    (state, repo)
}

pub fn failing_storage_state(repo: MockRepository) -> AppState {
    AppState {
        repo: Arc::new(repo),
        storage: Arc::new(MockImageStorage::new_failing()),
        config: AppConfig::default(),
    }
}

pub fn token_for(id: Uuid, role: Role) -> String {
    encode_session_token(
        id,
        role,
        chrono::Duration::hours(1),
        &AppConfig::default().jwt_secret,
    )
    .unwrap()
}

pub fn bearer(id: Uuid, role: Role) -> String {
    format!("Bearer {}", token_for(id, role))
}

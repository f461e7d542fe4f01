use rental_portal::{
    auth::Role,
    listing_status::ListingStatus,
    migrations::{ALL_STEPS, run_locked},
    models::{CreateListingRequest, ListingQuery, NewListing, UpdateListingRequest},
    repository::{PostgresRepository, Repository, StatusUpdate},
};
use serial_test::serial;
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        let report = run_locked(&pool, &ALL_STEPS)
            .await
            .expect("Failed to take the migration lock.");
        assert!(report.is_complete(), "schema steps failed: {:?}", report);

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

async fn create_test_user(pool: &PgPool, role: Role) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email, password_hash, role) VALUES ($1, $2, 'x', $3)")
        .bind(id)
        .bind(format!("{}@repo.test", id))
        .bind(role.as_str())
        .execute(pool)
        .await
        .unwrap();
    id
}

fn new_listing(owner: Uuid, city: &str, published: bool) -> NewListing {
    NewListing::from_request(
        CreateListingRequest {
            title: "Repository test flat".to_string(),
            description: String::new(),
            address: "1 Test Lane".to_string(),
            city: city.to_string(),
            monthly_rent: 1000,
            bedrooms: 2,
            bathrooms: 1,
            image_keys: vec![],
            published,
        },
        owner,
    )
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Postgres instance"]
async fn test_created_listing_is_available_and_versioned() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let owner = create_test_user(&ctx.pool, Role::Landlord).await;

    let listing = repo.create_listing(new_listing(owner, "Cork", false)).await.unwrap();

    assert_eq!(listing.status, ListingStatus::Available);
    assert!(!listing.published);
    assert_eq!(listing.version, 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Postgres instance"]
async fn test_published_search_never_returns_hidden_listings() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let owner = create_test_user(&ctx.pool, Role::Landlord).await;
    let city = format!("Hidden-{}", Uuid::new_v4());

    let hidden = repo.create_listing(new_listing(owner, &city, false)).await.unwrap();
    let shown = repo.create_listing(new_listing(owner, &city, true)).await.unwrap();

    let found = repo
        .list_published_listings(&ListingQuery {
            city: Some(city.clone()),
            ..ListingQuery::default()
        })
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, shown.id);
    assert!(repo.get_published_listing(hidden.id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Postgres instance"]
async fn test_status_write_is_version_checked_and_keeps_published() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let owner = create_test_user(&ctx.pool, Role::Landlord).await;
    let listing = repo.create_listing(new_listing(owner, "Cork", true)).await.unwrap();

    let updated = repo
        .set_listing_status(listing.id, ListingStatus::Reserved, Some(1))
        .await
        .unwrap();
    let StatusUpdate::Updated(updated) = updated else {
        panic!("expected the write to apply");
    };
    assert_eq!(updated.status, ListingStatus::Reserved);
    assert_eq!(updated.version, 2);
    assert!(updated.published);

    let stale = repo
        .set_listing_status(listing.id, ListingStatus::Rented, Some(1))
        .await
        .unwrap();
    assert!(matches!(stale, StatusUpdate::VersionConflict { current: 2 }));

    let missing = repo
        .set_listing_status(Uuid::new_v4(), ListingStatus::Rented, None)
        .await
        .unwrap();
    assert!(matches!(missing, StatusUpdate::NotFound));
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Postgres instance"]
async fn test_update_is_owner_only() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let owner = create_test_user(&ctx.pool, Role::Landlord).await;
    let stranger = create_test_user(&ctx.pool, Role::Landlord).await;
    let listing = repo.create_listing(new_listing(owner, "Cork", true)).await.unwrap();

    let change = UpdateListingRequest {
        monthly_rent: Some(1),
        ..UpdateListingRequest::default()
    };
    assert!(
        repo.update_listing(listing.id, stranger, change.clone())
            .await
            .unwrap()
            .is_none()
    );

    let updated = repo
        .update_listing(listing.id, owner, change)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.monthly_rent, 1);
    assert_eq!(updated.title, listing.title);
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Postgres instance"]
async fn test_backfill_sets_missing_status_then_becomes_a_no_op() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let owner = create_test_user(&ctx.pool, Role::Landlord).await;
    let listing = repo.create_listing(new_listing(owner, "Ennis", false)).await.unwrap();

    // A row written before the status column had a default.
    sqlx::query("UPDATE listings SET status = NULL WHERE id = $1")
        .bind(listing.id)
        .execute(&ctx.pool)
        .await
        .unwrap();

    let first = run_locked(&ctx.pool, &ALL_STEPS).await.unwrap();
    assert!(first.is_complete());
    assert!(first.rows_affected("backfill_listing_status") >= Some(1));

    let restored = repo.get_listing(listing.id).await.unwrap().unwrap();
    assert_eq!(restored.status, ListingStatus::Available);

    let second = run_locked(&ctx.pool, &ALL_STEPS).await.unwrap();
    assert_eq!(second.rows_affected("backfill_listing_status"), Some(0));
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Postgres instance"]
async fn test_concurrent_migration_runs_both_complete() {
    let ctx = DbTestContext::setup().await;

    let (a, b) = tokio::join!(
        run_locked(&ctx.pool, &ALL_STEPS),
        run_locked(&ctx.pool, &ALL_STEPS)
    );

    assert!(a.unwrap().is_complete());
    assert!(b.unwrap().is_complete());
}

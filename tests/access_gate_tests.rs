mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{ADMIN_ID, LANDLORD_ID, MockRepository, RENTER_ID, bearer, test_state, token_for};
use jsonwebtoken::{EncodingKey, Header, encode};
use rental_portal::{
    AppConfig,
    auth::{Role, encode_session_token},
    create_router,
    gate::{GateDecision, RENTER_HOME, evaluate, is_protected, sign_in_redirect},
};
use serde_json::json;
use tower::ServiceExt;

// --- Pure decision rules ---

#[test]
fn test_public_paths_are_always_allowed() {
    for path in ["/", "/health", "/listings", "/listings/42", "/swagger-ui"] {
        assert_eq!(evaluate(path, None), GateDecision::Allow, "{}", path);
        assert_eq!(evaluate(path, Some(Role::Renter)), GateDecision::Allow);
    }
}

#[test]
fn test_protected_paths_without_session_are_denied() {
    for path in [
        "/dashboard",
        "/dashboard/renter",
        "/dashboard/admin/listings",
        "/dashboard/landlord/listings",
        "/api/listings",
        "/api/listings/42",
    ] {
        assert_eq!(evaluate(path, None), GateDecision::Deny, "{}", path);
    }
}

#[test]
fn test_prefix_match_is_segment_aware_and_case_sensitive() {
    assert!(is_protected("/dashboard"));
    assert!(is_protected("/api/listings/mine"));
    assert!(!is_protected("/dashboards"));
    assert!(!is_protected("/api/listingsx"));
    assert!(!is_protected("/Dashboard/admin"));
}

#[test]
fn test_admin_section_requires_admin() {
    assert_eq!(
        evaluate("/dashboard/admin/anything", Some(Role::Admin)),
        GateDecision::Allow
    );
    assert_eq!(
        evaluate("/dashboard/admin/anything", Some(Role::Renter)),
        GateDecision::Redirect(RENTER_HOME)
    );
    assert_eq!(
        evaluate("/dashboard/admin/anything", Some(Role::Landlord)),
        GateDecision::Redirect(RENTER_HOME)
    );
}

#[test]
fn test_landlord_section_requires_landlord() {
    assert_eq!(
        evaluate("/dashboard/landlord/anything", Some(Role::Landlord)),
        GateDecision::Allow
    );
    assert_eq!(
        evaluate("/dashboard/landlord/anything", Some(Role::Renter)),
        GateDecision::Redirect(RENTER_HOME)
    );
    assert_eq!(
        evaluate("/dashboard/landlord/anything", Some(Role::Admin)),
        GateDecision::Redirect(RENTER_HOME)
    );
}

#[test]
fn test_any_session_reaches_shared_protected_paths() {
    for role in [Role::Admin, Role::Landlord, Role::Renter] {
        assert_eq!(evaluate("/dashboard/renter", Some(role)), GateDecision::Allow);
        assert_eq!(evaluate("/api/listings/42", Some(role)), GateDecision::Allow);
    }
}

#[test]
fn test_sign_in_redirect_encodes_callback() {
    assert_eq!(
        sign_in_redirect("/auth/signin", "/api/listings/42"),
        "/auth/signin?callbackUrl=%2Fapi%2Flistings%2F42"
    );
    assert_eq!(
        sign_in_redirect("/auth/signin", "/dashboard/renter?page=2"),
        "/auth/signin?callbackUrl=%2Fdashboard%2Frenter%3Fpage%3D2"
    );
}

// --- Through the router ---

async fn get(uri: &str, authorization: Option<String>) -> axum::response::Response {
    let (state, _) = test_state(MockRepository::with_listings(vec![]));
    let mut request = Request::builder().uri(uri);
    if let Some(value) = authorization {
        request = request.header(header::AUTHORIZATION, value);
    }
    create_router(state)
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn location(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_admin_reaches_admin_listings() {
    let response = get("/dashboard/admin/listings", Some(bearer(ADMIN_ID, Role::Admin))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_renter_on_admin_listings_is_sent_to_renter_dashboard() {
    let response = get("/dashboard/admin/listings", Some(bearer(RENTER_ID, Role::Renter))).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/dashboard/renter");
}

#[tokio::test]
async fn test_anonymous_api_request_is_sent_to_sign_in() {
    let response = get("/api/listings/42", None).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        "/auth/signin?callbackUrl=%2Fapi%2Flistings%2F42"
    );
}

#[tokio::test]
async fn test_unrouted_protected_path_is_still_gated() {
    let response = get("/dashboard/does-not-exist", None).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn test_public_route_needs_no_session() {
    let response = get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_session_cookie_is_accepted() {
    let (state, _) = test_state(MockRepository::with_listings(vec![]));
    let request = Request::builder()
        .uri("/dashboard/landlord/listings")
        .header(
            header::COOKIE,
            format!("theme=dark; session-token={}", token_for(LANDLORD_ID, Role::Landlord)),
        )
        .body(Body::empty())
        .unwrap();

    let response = create_router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_expired_token_is_denied() {
    let token = encode_session_token(
        ADMIN_ID,
        Role::Admin,
        chrono::Duration::hours(-2),
        &AppConfig::default().jwt_secret,
    )
    .unwrap();

    let response = get("/dashboard/admin/listings", Some(format!("Bearer {}", token))).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(location(&response).starts_with("/auth/signin?callbackUrl="));
}

#[tokio::test]
async fn test_token_signed_with_another_secret_is_denied() {
    let token = encode_session_token(
        ADMIN_ID,
        Role::Admin,
        chrono::Duration::hours(1),
        "some-other-secret",
    )
    .unwrap();

    let response = get("/dashboard/admin/listings", Some(format!("Bearer {}", token))).await;
    assert!(location(&response).starts_with("/auth/signin"));
}

#[tokio::test]
async fn test_token_with_unknown_role_is_denied() {
    let now = chrono::Utc::now().timestamp();
    let claims = json!({
        "sub": ADMIN_ID,
        "role": "SUPERUSER",
        "iat": now,
        "exp": now + 3600,
    });
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(AppConfig::default().jwt_secret.as_bytes()),
    )
    .unwrap();

    let response = get("/dashboard/renter", Some(format!("Bearer {}", token))).await;
    assert!(location(&response).starts_with("/auth/signin"));
}

#[tokio::test]
async fn test_token_without_role_is_denied() {
    let now = chrono::Utc::now().timestamp();
    let claims = json!({ "sub": RENTER_ID, "iat": now, "exp": now + 3600 });
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(AppConfig::default().jwt_secret.as_bytes()),
    )
    .unwrap();

    let response = get("/api/listings/mine", Some(format!("Bearer {}", token))).await;
    assert!(location(&response).starts_with("/auth/signin"));
}

#[tokio::test]
async fn test_malformed_token_is_denied() {
    let response = get("/dashboard/renter", Some("Bearer not-a-jwt".to_string())).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
}

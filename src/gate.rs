//! Access gate: decides allow / redirect / deny for every incoming request from
//! the request path and the session token's role claim alone.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    auth::{self, Role},
    config::AppConfig,
};

/// Safe landing page for sessions whose role does not match the section.
pub const RENTER_HOME: &str = "/dashboard/renter";

/// Prefixes that require a valid session.
pub const PROTECTED_PREFIXES: [&str; 2] = ["/dashboard", "/api/listings"];

const ADMIN_PREFIX: &str = "/dashboard/admin";
const LANDLORD_PREFIX: &str = "/dashboard/landlord";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect(&'static str),
    /// No valid session on a protected path; the caller sends it to sign-in.
    Deny,
}

/// True when `path` is `prefix` itself or a sub-path of it. Case-sensitive.
fn is_under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

pub fn is_protected(path: &str) -> bool {
    PROTECTED_PREFIXES
        .iter()
        .any(|prefix| is_under(path, prefix))
}

/// evaluate
///
/// Rules, in order:
/// 1. protected path without a valid session → `Deny`
/// 2. admin section and role ≠ ADMIN → redirect to the renter dashboard
/// 3. landlord section and role ≠ LANDLORD → redirect to the renter dashboard
/// 4. otherwise → `Allow`
///
/// The session check runs first so anonymous callers never learn role-gated
/// redirect targets.
pub fn evaluate(path: &str, role: Option<Role>) -> GateDecision {
    if !is_protected(path) {
        return GateDecision::Allow;
    }

    let Some(role) = role else {
        return GateDecision::Deny;
    };

    if is_under(path, ADMIN_PREFIX) && role != Role::Admin {
        return GateDecision::Redirect(RENTER_HOME);
    }

    if is_under(path, LANDLORD_PREFIX) && role != Role::Landlord {
        return GateDecision::Redirect(RENTER_HOME);
    }

    GateDecision::Allow
}

/// Sign-in URL carrying the originally requested location as `callbackUrl`.
pub fn sign_in_redirect(sign_in_path: &str, callback: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(callback.as_bytes()).collect();
    format!("{}?callbackUrl={}", sign_in_path, encoded)
}

/// access_gate
///
/// Middleware wrapping the whole router. On `Allow` the resolved session is stored
/// in the request extensions so the `AuthUser` extractor sees the same identity.
pub async fn access_gate(
    State(config): State<AppConfig>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    let session = auth::resolve_session(request.headers(), &config);

    match evaluate(&path, session.as_ref().map(|user| user.role)) {
        GateDecision::Allow => {
            if let Some(user) = session {
                request.extensions_mut().insert(user);
            }
            next.run(request).await
        }
        GateDecision::Redirect(target) => {
            tracing::debug!(%path, redirect_to = target, "role mismatch, redirecting");
            Redirect::temporary(target).into_response()
        }
        GateDecision::Deny => {
            let callback = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or(path.as_str());
            tracing::debug!(%path, "no valid session, redirecting to sign-in");
            Redirect::temporary(&sign_in_redirect(&config.sign_in_path, callback)).into_response()
        }
    }
}

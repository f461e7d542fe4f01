use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
};

/// Name of the cookie the sign-in flow stores the session token in.
pub const SESSION_COOKIE: &str = "session-token";

/// Role
///
/// The RBAC claim carried on every session token. It decides which dashboard
/// sections a session may reach.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Role {
    Admin,
    Landlord,
    #[default]
    Renter,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Landlord => "LANDLORD",
            Role::Renter => "RENTER",
        }
    }

    /// Landing page of the dashboard section owned by this role.
    pub fn dashboard_home(&self) -> &'static str {
        match self {
            Role::Admin => "/dashboard/admin",
            Role::Landlord => "/dashboard/landlord",
            Role::Renter => "/dashboard/renter",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid role `{0}`: expected one of ADMIN, LANDLORD, RENTER")]
pub struct InvalidRole(pub String);

impl FromStr for Role {
    type Err = InvalidRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ADMIN" => Ok(Role::Admin),
            "LANDLORD" => Ok(Role::Landlord),
            "RENTER" => Ok(Role::Renter),
            other => Err(InvalidRole(other.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = InvalidRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Claims
///
/// Payload of the session token issued by the external auth provider.
/// A token whose `role` is missing or outside the enumerated set fails to decode.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The user's id.
    pub sub: Uuid,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
}

/// AuthUser
///
/// The identity resolved from a request's session token. Handlers receive it
/// through the extractor below; nothing here touches the database.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

/// Pulls the raw session token from `Authorization: Bearer` or, failing that,
/// from the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// Validates signature and expiry. Every failure collapses to `None` so callers
/// fail closed.
pub fn decode_session_token(token: &str, secret: &str) -> Option<AuthUser> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(data) => Some(AuthUser {
            id: data.claims.sub,
            role: data.claims.role,
        }),
        Err(e) => {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("session token expired"),
                _ => tracing::debug!(error = %e, "session token rejected"),
            }
            None
        }
    }
}

/// Resolves the session attached to a request, if any.
pub fn resolve_session(headers: &HeaderMap, config: &AppConfig) -> Option<AuthUser> {
    session_token(headers).and_then(|token| decode_session_token(&token, &config.jwt_secret))
}

/// Signs a session token. Production tokens come from the auth provider; this is
/// used by the `issue-token` operator command for development sessions.
pub fn encode_session_token(
    user_id: Uuid,
    role: Role,
    ttl: Duration,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        role,
        iat: now.timestamp() as usize,
        exp: (now + ttl).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Rejects the request with a silent redirect when the session's role is not listed.
pub fn require_role(user: &AuthUser, allowed: &[Role]) -> AppResult<()> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        tracing::debug!(user_id = %user.id, role = %user.role, "role not permitted");
        Err(AppError::AuthorizationMismatch)
    }
}

/// AuthUser Extractor Implementation
///
/// Requests that passed the access gate already carry the resolved `AuthUser` in
/// their extensions. Otherwise the token is resolved here the same way the gate
/// does it.
///
/// Rejection: `AppError::AuthenticationMissing`.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let config = AppConfig::from_ref(state);
        resolve_session(&parts.headers, &config).ok_or(AppError::AuthenticationMissing)
    }
}

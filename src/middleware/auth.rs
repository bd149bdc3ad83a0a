// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT session tokens and the authentication middleware.

use crate::services::auth::Identity;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name of the HTTP-only cookie carrying the session token.
pub const SESSION_COOKIE: &str = "todo_session";

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Display name at sign-in time
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user extracted from JWT.
///
/// Handlers receive this as an explicit parameter; it is the only source of
/// the requester's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
}

/// A decoded, verified session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: AuthUser,
    pub email: Option<String>,
    pub issued_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl From<Claims> for Session {
    fn from(claims: Claims) -> Self {
        let to_time =
            |secs: usize| chrono::DateTime::from_timestamp(secs as i64, 0).unwrap_or_default();
        Self {
            issued_at: to_time(claims.iat),
            expires_at: to_time(claims.exp),
            email: claims.email,
            user: AuthUser {
                id: claims.sub,
                name: claims.name,
            },
        }
    }
}

/// Middleware that requires valid JWT authentication.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let session = authenticate(&jar, request.headers(), &state.config.jwt_signing_key)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    request.extensions_mut().insert(session.user);

    Ok(next.run(request).await)
}

/// Resolve the caller's session: the cookie token first, then
/// `Authorization: Bearer`. A cookie that fails verification does not hide
/// a valid bearer token.
pub fn authenticate(jar: &CookieJar, headers: &HeaderMap, signing_key: &[u8]) -> Option<Session> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| decode_session(cookie.value(), signing_key))
        .or_else(|| bearer_token(headers).and_then(|token| decode_session(token, signing_key)))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Verify a session token's signature and expiry.
///
/// Any failure, including a malformed token or an empty subject, yields `None`.
pub fn decode_session(token: &str, signing_key: &[u8]) -> Option<Session> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data = match decode::<Claims>(token, &key, &validation) {
        Ok(data) => data,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected session token");
            return None;
        }
    };

    if token_data.claims.sub.is_empty() {
        return None;
    }

    Some(token_data.claims.into())
}

/// Create a JWT for a user session.
pub fn create_jwt(identity: &Identity, signing_key: &[u8], max_age_secs: u64) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = usize::try_from(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())?;
    let exp = usize::try_from(max_age_secs)
        .ok()
        .and_then(|max_age| now.checked_add(max_age))
        .ok_or_else(|| anyhow::anyhow!("session lifetime {max_age_secs}s overflows expiry"))?;

    let claims = Claims {
        sub: identity.id.clone(),
        name: identity.name.clone(),
        email: Some(identity.email.clone()),
        iat: now,
        exp,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

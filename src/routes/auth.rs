// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Registration and sign-in routes (`/api/auth/*`).

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::config::Config;
use crate::error::{AppError, AppForm, AppJson, Result};
use crate::middleware::auth::{authenticate, create_jwt, SESSION_COOKIE};
use crate::models::{User, UserResponse};
use crate::routes::not_blank;
use crate::services::auth::{Identity, ProviderInfo, SignIn};
use crate::services::password;
use crate::time_utils::{format_utc_rfc3339, now_rfc3339};
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// Name of the double-submit CSRF cookie.
pub const CSRF_COOKIE: &str = "todo_csrf";

/// How long a Google sign-in may take between redirect and callback.
const OAUTH_STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/providers", get(providers))
        .route("/api/auth/csrf", get(csrf_token))
        .route("/api/auth/callback/credentials", post(credentials_callback))
        .route("/api/auth/signin/google", get(google_signin))
        .route("/api/auth/callback/google", get(google_callback))
        .route("/api/auth/session", get(get_session))
        .route("/api/auth/signout", post(signout))
}

// ─── Registration ────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub email: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub password: String,
}

/// Register a password account.
async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    body.validate().map_err(|_| {
        AppError::BadRequest("Email, name, and password are required".to_string())
    })?;

    let email = body.email.trim().to_string();

    if state.db.find_user_by_email(&email).await?.is_some() {
        tracing::info!("Registration rejected: email already registered");
        return Err(AppError::Conflict("User already exists".to_string()));
    }

    let hash = password::hash_password_async(body.password.trim().to_string()).await?;

    let now = now_rfc3339();
    let user = User {
        id: uuid::Uuid::now_v7().to_string(),
        email,
        name: body.name.trim().to_string(),
        password: Some(hash),
        email_verified: None,
        image: None,
        created_at: now.clone(),
        updated_at: now,
    };

    // A concurrent registration may still win here; the store reports Conflict.
    state.db.create_user(&user).await?;

    tracing::info!(user_id = %user.id, "Registered user");
    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

// ─── Providers & CSRF ────────────────────────────────────────

/// Configured sign-in providers, keyed by ID.
async fn providers(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<&'static str, ProviderInfo>> {
    Json(
        state
            .authenticator
            .providers()
            .into_iter()
            .map(|provider| (provider.id, provider))
            .collect(),
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrfResponse {
    pub csrf_token: String,
}

/// Issue a CSRF token for the credentials sign-in form.
///
/// The cookie holds `token|signature`; the form must echo `token`.
async fn csrf_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<CsrfResponse>)> {
    let token = random_hex(32)?;
    let signature = sign(&token, &state.config.jwt_signing_key)?;

    let cookie = Cookie::build((CSRF_COOKIE, format!("{}|{}", token, signature)))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(state.config.secure_cookies())
        .build();

    Ok((jar.add(cookie), Json(CsrfResponse { csrf_token: token })))
}

// ─── Credentials Sign-In ─────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    csrf_token: String,
    #[serde(default)]
    callback_url: Option<String>,
}

/// Verify email + password and start a session.
async fn credentials_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppForm(form): AppForm<CredentialsForm>,
) -> Result<(CookieJar, Redirect)> {
    if !verify_csrf(&jar, &form.csrf_token, &state.config.jwt_signing_key) {
        return Err(AppError::Forbidden("CSRF token mismatch".to_string()));
    }

    let sign_in = SignIn::Credentials {
        email: form.email,
        password: form.password,
    };
    let identity = state.authenticator.authenticate(sign_in).await?;

    let redirect_to = safe_callback_url(form.callback_url.as_deref(), &state.config.frontend_url);
    let jar = start_session(jar, &state.config, &identity)?;

    Ok((jar, Redirect::to(&redirect_to)))
}

// ─── Google Sign-In ──────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInParams {
    #[serde(default)]
    callback_url: Option<String>,
}

/// Start OAuth flow - redirect to Google authorization.
async fn google_signin(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SignInParams>,
) -> Result<Redirect> {
    let google = state.authenticator.google().ok_or_else(|| {
        AppError::NotFound("Sign-in provider google is not configured".to_string())
    })?;

    let callback_url =
        safe_callback_url(params.callback_url.as_deref(), &state.config.frontend_url);
    let oauth_state = encode_state(&callback_url, now_millis()?, &state.config.jwt_signing_key)?;

    let auth_url = google
        .client()
        .authorize_url(&google_redirect_uri(&state.config), &oauth_state);

    tracing::info!(callback_url = %callback_url, "Starting Google OAuth flow");

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct GoogleCallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code, upsert user, create session.
async fn google_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<GoogleCallbackParams>,
) -> Result<(CookieJar, Redirect)> {
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Google");
        let redirect = format!(
            "{}?error={}",
            state.config.frontend_url,
            urlencoding::encode(&error)
        );
        return Ok((jar, Redirect::temporary(&redirect)));
    }

    let callback_url = params
        .state
        .as_deref()
        .and_then(|s| verify_and_decode_state(s, &state.config.jwt_signing_key, now_millis().ok()?))
        .ok_or_else(|| AppError::Forbidden("Invalid or expired OAuth state".to_string()))?;

    let code = params
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let sign_in = SignIn::Google {
        code,
        redirect_uri: google_redirect_uri(&state.config),
    };
    tracing::debug!(provider = sign_in.provider(), "Exchanging authorization code");
    let identity = state.authenticator.authenticate(sign_in).await?;

    let jar = start_session(jar, &state.config, &identity)?;
    Ok((jar, Redirect::temporary(&callback_url)))
}

fn google_redirect_uri(config: &Config) -> String {
    format!("{}/api/auth/callback/google", config.api_url)
}

// ─── Session ─────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionResponse {
    pub user: SessionUser,
    /// Token expiry (RFC3339)
    pub expires: String,
}

/// Current session, or `null` when signed out or the token is invalid.
async fn get_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Json<Option<SessionResponse>> {
    let session = authenticate(&jar, &headers, &state.config.jwt_signing_key);

    Json(session.map(|session| SessionResponse {
        user: SessionUser {
            id: session.user.id,
            name: session.user.name,
            email: session.email,
        },
        expires: format_utc_rfc3339(session.expires_at),
    }))
}

/// Sign out - clear the session cookie.
///
/// Tokens are not revocable server-side; one copied elsewhere stays valid
/// until it expires.
async fn signout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, StatusCode) {
    let removal = Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(state.config.secure_cookies())
        .build();

    (jar.remove(removal), StatusCode::NO_CONTENT)
}

// ─── Helpers ─────────────────────────────────────────────────

/// Mint a session token for `identity` and attach it as a cookie.
fn start_session(jar: CookieJar, config: &Config, identity: &Identity) -> Result<CookieJar> {
    let jwt = create_jwt(identity, &config.jwt_signing_key, config.session_max_age_secs)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    tracing::info!(user_id = %identity.id, "Session issued");
    Ok(jar.add(session_cookie(jwt, config)))
}

/// Session cookie attributes shared by every sign-in path.
pub fn session_cookie(token: String, config: &Config) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(config.secure_cookies())
        .max_age(time::Duration::seconds(
            i64::try_from(config.session_max_age_secs).unwrap_or(i64::MAX),
        ))
        .build()
}

/// Resolve where to send the browser after sign-in.
///
/// Only paths on the frontend are allowed; anything else (absolute URLs to
/// other hosts, protocol-relative `//host`) falls back to the frontend root.
pub fn safe_callback_url(requested: Option<&str>, frontend_url: &str) -> String {
    let Some(requested) = requested.map(str::trim).filter(|r| !r.is_empty()) else {
        return frontend_url.to_string();
    };

    if requested.starts_with('/') && !requested.starts_with("//") && !requested.contains('\\') {
        return format!("{}{}", frontend_url, requested);
    }

    if requested == frontend_url
        || requested
            .strip_prefix(frontend_url)
            .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('?'))
    {
        return requested.to_string();
    }

    tracing::warn!(requested = %requested, "Ignoring off-site callback URL");
    frontend_url.to_string()
}

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

fn random_hex(len: usize) -> Result<String> {
    let mut bytes = vec![0u8; len];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG failure")))?;
    Ok(hex::encode(bytes))
}

/// Hex HMAC-SHA256 of `payload`.
fn sign(payload: &str, secret: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex HMAC-SHA256 signature.
fn verify_signature(payload: &str, signature_hex: &str, secret: &[u8]) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload.as_bytes());
    mac.verify_slice(&signature).is_ok()
}

/// Check the submitted CSRF token against the signed cookie.
fn verify_csrf(jar: &CookieJar, submitted: &str, secret: &[u8]) -> bool {
    let Some(cookie) = jar.get(CSRF_COOKIE) else {
        return false;
    };
    let Some((token, signature)) = cookie.value().split_once('|') else {
        return false;
    };

    !submitted.is_empty()
        && verify_signature(token, signature, secret)
        && bool::from(token.as_bytes().ct_eq(submitted.as_bytes()))
}

/// Encode the post-sign-in URL and a timestamp into a signed OAuth state.
///
/// Format (before base64): `callback_url|timestamp_hex|signature_hex`.
fn encode_state(callback_url: &str, now_ms: u128, secret: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", callback_url, now_ms);
    let signature = sign(&payload, secret)?;
    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Verify HMAC signature and age, and decode the callback URL from the OAuth state.
fn verify_and_decode_state(state: &str, secret: &[u8], now_ms: u128) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Split from the right: the URL itself may contain '|'
    let mut parts = state_str.rsplitn(3, '|');
    let signature_hex = parts.next()?;
    let timestamp_hex = parts.next()?;
    let callback_url = parts.next()?;

    let payload = format!("{}|{}", callback_url, timestamp_hex);
    if !verify_signature(&payload, signature_hex, secret) {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let issued_ms = u128::from_str_radix(timestamp_hex, 16).ok()?;
    if now_ms.saturating_sub(issued_ms) > OAUTH_STATE_MAX_AGE_MS || issued_ms > now_ms {
        tracing::warn!("Expired OAuth state");
        return None;
    }

    Some(callback_url.to_string())
}

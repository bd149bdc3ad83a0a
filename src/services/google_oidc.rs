// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google ID token verification for the Google sign-in provider.
//!
//! Signing keys come from Google's JWKS document, located through OpenID
//! discovery and cached for as long as Google's `Cache-Control` allows. A
//! token naming an unknown `kid` forces one refetch, which covers key
//! rotation between cache refreshes.

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::{HeaderMap, CACHE_CONTROL};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};

const DISCOVERY_URL: &str = "https://accounts.google.com/.well-known/openid-configuration";
const FALLBACK_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const FALLBACK_KEY_TTL: Duration = Duration::from_secs(300);
const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];
const CLOCK_SKEW_SECS: u64 = 60;

/// Identity asserted by a valid Google ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    /// Stable Google account ID (`sub`)
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Why an ID token could not be accepted.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OidcError {
    /// The token is invalid or its claims do not match expectations.
    #[error("ID token rejected: {0}")]
    Rejected(String),
    /// Google's key endpoints could not be reached; sign-in may be retried.
    #[error("ID token verification unavailable: {0}")]
    Transient(String),
}

type KeyMap = HashMap<String, Arc<DecodingKey>>;

struct CachedKeys {
    jwks_uri: String,
    keys: KeyMap,
    fresh_until: Instant,
}

/// Google's published signing keys with a refresh-on-expiry cache.
struct GoogleKeys {
    http: reqwest::Client,
    cached: RwLock<Option<CachedKeys>>,
    // Serializes refetches so concurrent sign-ins trigger one download.
    refetch: Mutex<()>,
}

enum KeySource {
    Google(GoogleKeys),
    /// A single pre-shared key, for tests.
    Pinned { kid: String, key: Arc<DecodingKey> },
}

/// Verifier for Google-issued ID tokens addressed to this OAuth client.
pub struct GoogleIdTokenVerifier {
    client_id: String,
    keys: KeySource,
}

impl GoogleIdTokenVerifier {
    /// Create a production verifier that discovers and caches Google JWKS keys.
    pub fn new(http_client: reqwest::Client, client_id: &str) -> Self {
        tracing::info!(client_id = %client_id, "Google ID token verifier ready");

        Self {
            client_id: client_id.to_string(),
            keys: KeySource::Google(GoogleKeys {
                http: http_client,
                cached: RwLock::new(None),
                refetch: Mutex::new(()),
            }),
        }
    }

    /// Create a verifier that trusts exactly one RSA public key under `kid`.
    pub fn new_with_static_key(
        client_id: &str,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        anyhow::ensure!(!kid.trim().is_empty(), "static OIDC kid must not be empty");

        Ok(Self {
            client_id: client_id.to_string(),
            keys: KeySource::Pinned {
                kid,
                key: Arc::new(decoding_key),
            },
        })
    }

    /// Verify an ID token returned by Google's token endpoint.
    pub async fn verify_id_token(&self, token: &str) -> Result<GoogleIdentity, OidcError> {
        if token.is_empty() {
            return Err(OidcError::Rejected("ID token is empty".to_string()));
        }

        let header = decode_header(token)
            .map_err(|e| OidcError::Rejected(format!("invalid JWT header: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(OidcError::Rejected(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| OidcError::Rejected("missing JWT kid".to_string()))?;

        let key = self.key_for(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.validate_nbf = true;
        validation.leeway = CLOCK_SKEW_SECS;

        let claims = decode::<IdTokenClaims>(token, &key, &validation)
            .map_err(|e| OidcError::Rejected(format!("JWT validation failed: {e}")))?
            .claims;

        tracing::debug!(
            subject = %claims.sub,
            issuer = %claims.iss,
            email_verified = ?claims.email_verified,
            "Google ID token signature valid"
        );

        claims.into_identity(now_unix_secs())
    }

    async fn key_for(&self, kid: &str) -> Result<Arc<DecodingKey>, OidcError> {
        match &self.keys {
            KeySource::Pinned { kid: pinned, key } if pinned == kid => Ok(key.clone()),
            KeySource::Pinned { .. } => Err(OidcError::Rejected(format!(
                "unknown JWT kid for static verifier: {kid}"
            ))),
            KeySource::Google(google) => google.key_for(kid).await,
        }
    }
}

impl GoogleKeys {
    async fn key_for(&self, kid: &str) -> Result<Arc<DecodingKey>, OidcError> {
        if let Some(key) = self.fresh_key(kid).await {
            return Ok(key);
        }

        // First pass only reloads an expired cache; the second handles rotation.
        for force in [false, true] {
            self.refetch(force).await?;
            if let Some(key) = self.fresh_key(kid).await {
                return Ok(key);
            }
        }

        Err(OidcError::Rejected(format!(
            "JWT kid not found in JWKS after refresh: {kid}"
        )))
    }

    async fn fresh_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cached = self.cached.read().await;
        cached
            .as_ref()
            .filter(|c| c.fresh_until > Instant::now())
            .and_then(|c| c.keys.get(kid).cloned())
    }

    async fn refetch(&self, force: bool) -> Result<(), OidcError> {
        let _guard = self.refetch.lock().await;

        let previous_uri = {
            let cached = self.cached.read().await;
            if !force && cached.as_ref().is_some_and(|c| c.fresh_until > Instant::now()) {
                // Another task refreshed while we waited for the lock
                return Ok(());
            }
            cached.as_ref().map(|c| c.jwks_uri.clone())
        };

        let jwks_uri = self.discover_jwks_uri(previous_uri).await;
        tracing::debug!(jwks_uri = %jwks_uri, "Fetching Google JWKS");

        let response = self
            .http
            .get(&jwks_uri)
            .send()
            .await
            .map_err(|e| OidcError::Transient(format!("JWKS request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(OidcError::Transient(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = max_age(response.headers()).unwrap_or(FALLBACK_KEY_TTL);
        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| OidcError::Transient(format!("invalid JWKS JSON: {e}")))?;

        let keys = jwks.into_key_map();
        if keys.is_empty() {
            tracing::error!("Google JWKS contained no usable RSA signing keys");
            return Err(OidcError::Transient(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        tracing::debug!(keys = keys.len(), ttl_secs = ttl.as_secs(), "Google JWKS cached");
        *self.cached.write().await = Some(CachedKeys {
            jwks_uri,
            keys,
            fresh_until: Instant::now() + ttl,
        });
        Ok(())
    }

    /// Look up the JWKS location; discovery failures fall back to the last
    /// known URI, then to Google's documented default.
    async fn discover_jwks_uri(&self, previous: Option<String>) -> String {
        let fallback = || previous.clone().unwrap_or_else(|| FALLBACK_JWKS_URL.to_string());

        let response = match self.http.get(DISCOVERY_URL).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::warn!(status = %response.status(), "OIDC discovery failed; using fallback JWKS URI");
                return fallback();
            }
            Err(e) => {
                tracing::warn!(error = %e, "OIDC discovery request failed; using fallback JWKS URI");
                return fallback();
            }
        };

        match response.json::<OpenIdConfig>().await {
            Ok(config) => config.jwks_uri,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid OIDC discovery document; using fallback JWKS URI");
                fallback()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenIdConfig {
    jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    #[serde(rename = "use")]
    key_use: Option<String>,
    n: String,
    e: String,
}

impl Jwk {
    fn is_rs256_signing_key(&self) -> bool {
        self.kty == "RSA"
            && !self.kid.trim().is_empty()
            && self.alg.as_deref().is_none_or(|alg| alg == "RS256")
            && self.key_use.as_deref().is_none_or(|u| u == "sig")
    }
}

impl Jwks {
    fn into_key_map(self) -> KeyMap {
        self.keys
            .into_iter()
            .filter(Jwk::is_rs256_signing_key)
            .filter_map(|jwk| match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => Some((jwk.kid, Arc::new(key))),
                Err(e) => {
                    tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    iss: String,
    sub: String,
    iat: Option<u64>,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

impl IdTokenClaims {
    /// Checks beyond what `jsonwebtoken` validates: issue time and a
    /// verified email address.
    fn into_identity(self, now: u64) -> Result<GoogleIdentity, OidcError> {
        match self.iat {
            None => return Err(OidcError::Rejected("missing iat claim".to_string())),
            Some(iat) if iat > now + CLOCK_SKEW_SECS => {
                return Err(OidcError::Rejected("iat claim is in the future".to_string()))
            }
            Some(_) => {}
        }

        let email = self
            .email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty())
            .ok_or_else(|| OidcError::Rejected("missing email claim".to_string()))?;

        if self.email_verified != Some(true) {
            return Err(OidcError::Rejected(format!(
                "email not verified (email_verified = {:?})",
                self.email_verified
            )));
        }

        Ok(GoogleIdentity {
            subject: self.sub,
            email,
            name: self.name,
            picture: self.picture,
        })
    }
}

/// `max-age` from a `Cache-Control` header, if present and numeric.
fn max_age(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(CACHE_CONTROL)?.to_str().ok()?;
    parse_max_age(value).map(Duration::from_secs)
}

fn parse_max_age(cache_control: &str) -> Option<u64> {
    cache_control
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|secs| secs.trim_matches('"').parse().ok())
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

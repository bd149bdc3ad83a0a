// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;

/// Minimum length of the session signing secret, in bytes.
pub const MIN_SIGNING_KEY_LEN: usize = 32;

/// Default session lifetime (30 days).
pub const DEFAULT_SESSION_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;

/// Longest accepted session lifetime (365 days).
pub const MAX_SESSION_MAX_AGE_SECS: u64 = 365 * 24 * 60 * 60;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL for CORS and post-sign-in redirects
    pub frontend_url: String,
    /// Public base URL of this API (used for OAuth redirect URIs)
    pub api_url: String,
    /// Server port
    pub port: u16,
    /// Which persistence backend to use
    pub storage: StorageBackend,
    /// GCP project ID (Firestore database)
    pub gcp_project_id: String,
    /// Session token lifetime in seconds
    pub session_max_age_secs: u64,
    /// Google OAuth credentials; the Google provider is disabled when absent
    pub google: Option<GoogleOAuthConfig>,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

/// Google OAuth client credentials.
#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
}

/// Persistence backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Firestore,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::Invalid(
                "STORAGE_BACKEND",
                format!("unknown backend '{other}' (expected 'firestore' or 'memory')"),
            )),
        }
    }
}

impl Config {
    /// Deterministic config for tests: in-memory storage, Google disabled.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:3000".to_string(),
            api_url: "http://localhost:8080".to_string(),
            port: 8080,
            storage: StorageBackend::Memory,
            gcp_project_id: "test-project".to_string(),
            session_max_age_secs: DEFAULT_SESSION_MAX_AGE_SECS,
            google: None,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!!".to_vec(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_signing_key = env::var("AUTH_SECRET")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("AUTH_SECRET"))?
            .into_bytes();
        if jwt_signing_key.len() < MIN_SIGNING_KEY_LEN {
            return Err(ConfigError::Invalid(
                "AUTH_SECRET",
                format!("must be at least {MIN_SIGNING_KEY_LEN} bytes"),
            ));
        }

        let storage = match env::var("STORAGE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => StorageBackend::Firestore,
        };

        let google = match (env::var("AUTH_GOOGLE_ID"), env::var("AUTH_GOOGLE_SECRET")) {
            (Ok(client_id), Ok(client_secret)) => Some(GoogleOAuthConfig {
                client_id: client_id.trim().to_string(),
                client_secret: client_secret.trim().to_string(),
            }),
            (Err(_), Err(_)) => None,
            (Ok(_), Err(_)) => return Err(ConfigError::Missing("AUTH_GOOGLE_SECRET")),
            (Err(_), Ok(_)) => return Err(ConfigError::Missing("AUTH_GOOGLE_ID")),
        };

        let session_max_age_secs = match env::var("SESSION_MAX_AGE_SECS") {
            Ok(raw) => parse_session_max_age(&raw)?,
            Err(_) => DEFAULT_SESSION_MAX_AGE_SECS,
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            api_url: env::var("API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            storage,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            session_max_age_secs,
            google,
            jwt_signing_key,
        })
    }

    /// Whether cookies should carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.frontend_url.starts_with("https://")
    }
}

/// Parse a session lifetime, which must be between one second and one year.
fn parse_session_max_age(raw: &str) -> Result<u64, ConfigError> {
    let secs: u64 = raw.trim().parse().map_err(|_| {
        ConfigError::Invalid("SESSION_MAX_AGE_SECS", format!("not a number: {raw}"))
    })?;
    if !(1..=MAX_SESSION_MAX_AGE_SECS).contains(&secs) {
        return Err(ConfigError::Invalid(
            "SESSION_MAX_AGE_SECS",
            format!("{secs} is outside 1..={MAX_SESSION_MAX_AGE_SECS}"),
        ));
    }
    Ok(secs)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

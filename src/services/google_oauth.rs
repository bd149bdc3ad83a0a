// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth 2.0 client for the authorization-code flow.
//!
//! Handles:
//! - Building the consent-screen URL
//! - Exchanging an authorization code for an ID token
//! - Verifying that ID token (see [`GoogleIdTokenVerifier`])

use crate::config::GoogleOAuthConfig;
use crate::error::AppError;
use crate::services::google_oidc::{GoogleIdTokenVerifier, GoogleIdentity, OidcError};
use anyhow::Context;
use serde::Deserialize;
use std::time::Duration;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Google OAuth client.
pub struct GoogleOAuthClient {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    verifier: GoogleIdTokenVerifier,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
}

impl GoogleOAuthClient {
    /// Create a production client that verifies ID tokens against Google's JWKS.
    pub fn new(config: &GoogleOAuthConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building Google OAuth HTTP client")?;
        let verifier = GoogleIdTokenVerifier::new(http.clone(), &config.client_id);

        Ok(Self::with_parts(http, TOKEN_URL.to_string(), config, verifier))
    }

    /// Create a client with an explicit token endpoint and verifier (tests).
    pub fn with_parts(
        http: reqwest::Client,
        token_url: String,
        config: &GoogleOAuthConfig,
        verifier: GoogleIdTokenVerifier,
    ) -> Self {
        Self {
            http,
            token_url,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            verifier,
        }
    }

    /// URL of Google's consent screen for this client.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            AUTHORIZE_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode("openid email profile"),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code and verify the returned ID token.
    ///
    /// `Ok(None)` means Google or the token rejected the sign-in.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<Option<GoogleIdentity>, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Token exchange request failed: {}", e)))?;

        let status = response.status();
        if status.is_client_error() {
            // invalid_grant and friends: the code was bad, expired, or replayed
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Google rejected authorization code");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(AppError::Provider(format!(
                "Token exchange returned HTTP {}",
                status
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("Invalid token response: {}", e)))?;

        let Some(id_token) = tokens.id_token else {
            return Err(AppError::Provider(
                "Token response did not include an id_token".to_string(),
            ));
        };

        match self.verifier.verify_id_token(&id_token).await {
            Ok(identity) => Ok(Some(identity)),
            Err(OidcError::Rejected(reason)) => {
                tracing::warn!(reason = %reason, "Rejected Google ID token");
                Ok(None)
            }
            Err(OidcError::Transient(reason)) => Err(AppError::Provider(reason)),
        }
    }
}

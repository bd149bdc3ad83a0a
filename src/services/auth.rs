// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in providers.
//!
//! Every provider turns its own kind of [`SignIn`] input into a verified
//! [`Identity`] or rejects it. Minting the session token from an identity
//! is the caller's job and does not depend on which provider ran.

use crate::db::Db;
use crate::error::AppError;
use crate::models::{LinkedAccount, User};
use crate::services::google_oauth::GoogleOAuthClient;
use crate::services::google_oidc::GoogleIdentity;
use crate::services::password;
use crate::time_utils::now_rfc3339;
use serde::Serialize;

pub const CREDENTIALS_PROVIDER: &str = "credentials";
pub const GOOGLE_PROVIDER: &str = "google";

/// Sign-in input, tagged by provider.
pub enum SignIn {
    Credentials { email: String, password: String },
    Google { code: String, redirect_uri: String },
}

impl SignIn {
    pub fn provider(&self) -> &'static str {
        match self {
            SignIn::Credentials { .. } => CREDENTIALS_PROVIDER,
            SignIn::Google { .. } => GOOGLE_PROVIDER,
        }
    }
}

/// A verified user identity, ready to be put into a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

/// Why a sign-in did not produce an identity.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Bad credentials, unknown account, or a provider refusal. Deliberately
    /// carries no detail.
    #[error("sign-in rejected")]
    Rejected,

    #[error("provider {0} is not configured")]
    Unavailable(&'static str),

    #[error(transparent)]
    Failed(#[from] AppError),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Rejected => AppError::InvalidCredentials,
            AuthError::Unavailable(provider) => {
                AppError::NotFound(format!("Sign-in provider {provider} is not configured"))
            }
            AuthError::Failed(inner) => inner,
        }
    }
}

/// Provider description for `GET /api/auth/providers`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProviderInfo {
    pub id: &'static str,
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// Email + password sign-in against stored Argon2 hashes.
pub struct CredentialsProvider {
    db: Db,
}

impl CredentialsProvider {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::Rejected);
        }

        let user = self.db.find_user_by_email(email).await?;
        let digest = user.as_ref().and_then(|user| user.password.clone());

        // Runs even without a digest so unknown emails cost the same time.
        let valid = password::verify_password_async(password.to_string(), digest)
            .await
            .map_err(AppError::Internal)?;

        match user {
            Some(user) if valid => {
                tracing::info!(user_id = %user.id, "Credentials sign-in succeeded");
                Ok(Identity::from(&user))
            }
            _ => {
                tracing::info!("Credentials sign-in rejected");
                Err(AuthError::Rejected)
            }
        }
    }
}

/// Google sign-in: identity verification is delegated to Google entirely.
pub struct GoogleProvider {
    client: GoogleOAuthClient,
    db: Db,
}

impl GoogleProvider {
    pub fn new(client: GoogleOAuthClient, db: Db) -> Self {
        Self { client, db }
    }

    pub fn client(&self) -> &GoogleOAuthClient {
        &self.client
    }

    pub async fn authenticate(&self, code: &str, redirect_uri: &str) -> Result<Identity, AuthError> {
        let Some(google) = self.client.exchange_code(code, redirect_uri).await? else {
            return Err(AuthError::Rejected);
        };

        let user = upsert_federated_user(&self.db, GOOGLE_PROVIDER, &google).await?;
        tracing::info!(user_id = %user.id, "Google sign-in succeeded");
        Ok(Identity::from(&user))
    }
}

/// Resolve the local user for a provider identity, creating or linking as needed.
///
/// Order: an existing account link wins; otherwise the user with the same
/// email is linked; otherwise a password-less user is created.
pub async fn upsert_federated_user(
    db: &Db,
    provider: &str,
    identity: &GoogleIdentity,
) -> Result<User, AppError> {
    if let Some(account) = db.find_linked_account(provider, &identity.subject).await? {
        if let Some(user) = db.get_user(&account.user_id).await? {
            return Ok(user);
        }
        tracing::warn!(
            user_id = %account.user_id,
            provider,
            "Linked account points at a missing user; relinking by email"
        );
    }

    let now = now_rfc3339();

    let user = match db.find_user_by_email(&identity.email).await? {
        Some(mut user) => {
            if user.email_verified.is_none() {
                user.email_verified = Some(now.clone());
                user.updated_at = now.clone();
                db.update_user(&user).await?;
            }
            user
        }
        None => {
            let user = User {
                id: uuid::Uuid::now_v7().to_string(),
                email: identity.email.clone(),
                name: identity
                    .name
                    .as_deref()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .unwrap_or(&identity.email)
                    .to_string(),
                password: None,
                email_verified: Some(now.clone()),
                image: identity.picture.clone(),
                created_at: now.clone(),
                updated_at: now.clone(),
            };

            match db.create_user(&user).await {
                Ok(()) => {
                    tracing::info!(user_id = %user.id, provider, "Created user from federated sign-in");
                    user
                }
                // Lost a race with a concurrent first sign-in for the same email.
                Err(AppError::Conflict(_)) => db
                    .find_user_by_email(&identity.email)
                    .await?
                    .ok_or_else(|| {
                        AppError::Database("User vanished after email conflict".to_string())
                    })?,
                Err(e) => return Err(e),
            }
        }
    };

    db.link_account(&LinkedAccount {
        user_id: user.id.clone(),
        provider: provider.to_string(),
        provider_account_id: identity.subject.clone(),
        created_at: now,
    })
    .await?;

    Ok(user)
}

/// All configured sign-in providers.
pub struct Authenticator {
    credentials: CredentialsProvider,
    google: Option<GoogleProvider>,
}

impl Authenticator {
    pub fn new(db: Db, google: Option<GoogleOAuthClient>) -> Self {
        Self {
            credentials: CredentialsProvider::new(db.clone()),
            google: google.map(|client| GoogleProvider::new(client, db)),
        }
    }

    /// Run the provider matching `sign_in`.
    pub async fn authenticate(&self, sign_in: SignIn) -> Result<Identity, AuthError> {
        match sign_in {
            SignIn::Credentials { email, password } => {
                self.credentials.authenticate(&email, &password).await
            }
            SignIn::Google { code, redirect_uri } => {
                self.google
                    .as_ref()
                    .ok_or(AuthError::Unavailable(GOOGLE_PROVIDER))?
                    .authenticate(&code, &redirect_uri)
                    .await
            }
        }
    }

    pub fn google(&self) -> Option<&GoogleProvider> {
        self.google.as_ref()
    }

    pub fn providers(&self) -> Vec<ProviderInfo> {
        let mut providers = vec![ProviderInfo {
            id: CREDENTIALS_PROVIDER,
            name: "Credentials",
            kind: "credentials",
        }];
        if self.google.is_some() {
            providers.push(ProviderInfo {
                id: GOOGLE_PROVIDER,
                name: "Google",
                kind: "oidc",
            });
        }
        providers
    }
}

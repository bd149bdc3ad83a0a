//! User model for storage and API.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// User record stored in the `users` collection.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Opaque user ID (also used as document ID)
    pub id: String,
    /// Email address, trimmed; unique across users
    pub email: String,
    /// Display name
    pub name: String,
    /// Argon2 PHC hash; absent for accounts created through OAuth
    #[serde(default)]
    pub password: Option<String>,
    /// When a provider last vouched for the email (RFC3339)
    #[serde(default)]
    pub email_verified: Option<String>,
    /// Avatar URL supplied by an identity provider
    #[serde(default)]
    pub image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("has_password", &self.password.is_some())
            .field("email_verified", &self.email_verified)
            .finish_non_exhaustive()
    }
}

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

/// Link between a user and an external identity provider account,
/// stored in the `accounts` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAccount {
    pub user_id: String,
    /// Provider ID, e.g. `google`
    pub provider: String,
    /// Subject identifier issued by the provider
    pub provider_account_id: String,
    pub created_at: String,
}

impl LinkedAccount {
    /// Document ID for this account link.
    pub fn document_id(&self) -> String {
        account_document_id(&self.provider, &self.provider_account_id)
    }
}

/// Document ID for a `(provider, provider_account_id)` pair.
pub fn account_document_id(provider: &str, provider_account_id: &str) -> String {
    format!("{}_{}", provider, urlencoding::encode(provider_account_id))
}

/// Email uniqueness index stored in the `user_emails` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEmail {
    pub user_id: String,
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod auth;
pub mod google_oauth;
pub mod google_oidc;
pub mod password;

pub use auth::{AuthError, Authenticator, Identity, SignIn};
pub use google_oauth::GoogleOAuthClient;
pub use google_oidc::{GoogleIdTokenVerifier, GoogleIdentity, OidcError};

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Todo-Auth: multi-user to-do list backend
//!
//! This crate provides the JSON API for registering users, signing them in
//! with a password or Google, and managing each user's own to-do items.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Db;
use services::Authenticator;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Db,
    pub authenticator: Authenticator,
}

impl AppState {
    /// Assemble state; the Google provider is enabled when a client is given.
    pub fn new(config: Config, db: Db, google: Option<services::GoogleOAuthClient>) -> Self {
        let authenticator = Authenticator::new(db.clone(), google);
        Self {
            config,
            db,
            authenticator,
        }
    }
}

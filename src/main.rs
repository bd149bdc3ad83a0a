// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Todo-Auth API Server
//!
//! Serves the to-do JSON API and the sign-in endpoints used by the web UI.

use std::sync::Arc;
use todo_auth::{config::Config, db::Db, services::GoogleOAuthClient, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, storage = ?config.storage, "Starting Todo-Auth API");

    let db = Db::connect(&config)
        .await
        .expect("Failed to connect to database");

    let google = match &config.google {
        Some(google_config) => {
            let client =
                GoogleOAuthClient::new(google_config).expect("Failed to initialize Google OAuth");
            tracing::info!("Google sign-in enabled");
            Some(client)
        }
        None => {
            tracing::info!("Google sign-in disabled (AUTH_GOOGLE_ID not set)");
            None
        }
    };

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), db, google));

    // Build router
    let app = todo_auth::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("todo_auth=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}

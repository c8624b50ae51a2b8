// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pixigen API Server
//!
//! Receives Clerk and Stripe webhooks and serves the image/credit API for
//! the Pixigen frontend.

use pixigen_api::{config::Config, db, services::ClerkClient, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Pixigen API");

    // Document store (Firestore connects on first use)
    let store = db::create_store(&config.store);

    let clerk = Arc::new(ClerkClient::new(
        config.clerk_api_url.clone(),
        config.clerk_secret_key.clone(),
    ));
    tracing::info!(api_url = %config.clerk_api_url, "Clerk client initialized");

    let port = config.port;
    let state = Arc::new(AppState::new(config, store, clerk)?);

    // Build router
    let app = pixigen_api::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pixigen_api=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}

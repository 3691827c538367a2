// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Solthron account service
//!
//! Hosts the sign-in, session relay and metered generation flows for the
//! website and the pages the browser extension opens.

use solthron_auth::{
    config::Config,
    db::FirestoreDb,
    services::{BackendClient, FirebaseAuthClient, FirebaseTokenVerifier},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Solthron account service");

    // Account records live in Firestore
    let db = FirestoreDb::new(&config.firebase_project_id).await?;

    let auth_client = FirebaseAuthClient::new(
        &config.firebase_api_key,
        config.auth_emulator_host.as_deref(),
    )?;

    let backend = BackendClient::new(&config.backend_url)?;
    tracing::info!(backend = %config.backend_url, "Backend client initialized");

    let token_verifier = Arc::new(FirebaseTokenVerifier::new(&config.firebase_project_id)?);

    // Build shared state
    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::new(db),
        Arc::new(auth_client),
        backend,
        token_verifier,
    ));

    // Forget anonymous clients that stopped coming back
    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60 * 60));
        loop {
            interval.tick().await;
            sweep_state.anonymous.prune_expired();
        }
    });

    // Build router
    let app = solthron_auth::routes::create_router(state);

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

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in ["solthron_auth=debug", "info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::registry().with(filter).with(format).init();
}

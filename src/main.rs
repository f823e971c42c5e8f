// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wellness-Sync API Server
//!
//! Keeps the administrator's calendar credential fresh and syncs the shared
//! calendar into each user's event rows, on demand and on a timer.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wellness_sync::{
    config::Config,
    db::{CalendarStore, CredentialStore, FirestoreDb, MemoryDb},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Wellness-Sync API");

    // Initialize storage
    let (credentials, calendars): (Arc<dyn CredentialStore>, Arc<dyn CalendarStore>) =
        if config.gcp_project_id == "memory" {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            let db = MemoryDb::new();
            (Arc::new(db.clone()), Arc::new(db))
        } else {
            let db = FirestoreDb::new(&config.gcp_project_id).await?;
            (Arc::new(db.clone()), Arc::new(db))
        };

    let state = Arc::new(AppState::new(config.clone(), credentials, calendars)?);

    // Background auto-sync runs alongside on-demand syncs
    tokio::spawn(
        state
            .sync_service
            .clone()
            .run_auto_sync(config.sync_interval, config.auto_sync_users.clone()),
    );

    // Build router
    let app = wellness_sync::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wellness_sync=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}

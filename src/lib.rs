// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Wellness-Sync: shared calendar sync for the wellness dashboard
//!
//! This crate provides the backend API that keeps one administrator's
//! provider credentials fresh and reconciles the shared calendar into each
//! user's local event rows.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::{CalendarStore, CredentialStore};
use error::AppError;
use services::{AuthenticatedClient, CalendarApi, CalendarSyncService, TokenRefresher};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Arc<Config>,
    pub credentials: Arc<dyn CredentialStore>,
    pub calendars: Arc<dyn CalendarStore>,
    pub refresher: TokenRefresher,
    pub sync_service: CalendarSyncService,
}

impl AppState {
    /// Wire every service on top of the given stores.
    pub fn new(
        config: Config,
        credentials: Arc<dyn CredentialStore>,
        calendars: Arc<dyn CalendarStore>,
    ) -> Result<Self, AppError> {
        let config = Arc::new(config);
        let http = services::http_client(config.http_timeout)?;

        let refresher = TokenRefresher::new(http.clone(), credentials.clone(), config.clone());
        let client = AuthenticatedClient::new(http, credentials.clone(), refresher.clone());
        let api = CalendarApi::new(client, config.google_calendar_api_url.clone());

        let sync_service = CalendarSyncService::new(
            api,
            calendars.clone(),
            credentials.clone(),
            config.admin_account_id.clone(),
            config.sync_window_days,
        );

        Ok(Self {
            config,
            credentials,
            calendars,
            refresher,
            sync_service,
        })
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod calendar;
pub mod executor;
pub mod reconcile;
pub mod sync;
pub mod token;

pub use calendar::CalendarApi;
pub use executor::{ApiRequest, AuthFailure, AuthenticatedClient, CallError};
pub use reconcile::{CalendarReconciler, ReconcileSummary};
pub use sync::{CalendarSyncService, CreatedEvent, NewEvent, SyncError, SyncResult};
pub use token::{RefreshError, TokenRefresher};

use crate::error::AppError;
use std::time::Duration;

/// Shared HTTP client for provider calls. Every request gets `timeout`.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))
}

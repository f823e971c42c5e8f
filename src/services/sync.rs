// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync orchestrator for the shared calendar.
//!
//! Handles:
//! - On-demand and periodic sync (fetch window, reconcile into a user's rows)
//! - Calendar switch (wipe every row, then resync)
//! - Manual add (create upstream, then let the next sync pull it back)
//! - Connection state of the administrator's credential
//!
//! All provider calls are made with the administrator's credential.

use crate::db::{CalendarStore, CredentialStore};
use crate::error::AppError;
use crate::models::{
    ConnectionState, EventTime, NewRemoteEvent, Provider, RemoteCalendar, SharedCalendarSetting,
    PRIMARY_CALENDAR_ID,
};
use crate::services::calendar::CalendarApi;
use crate::services::executor::{AuthFailure, CallError};
use crate::services::reconcile::CalendarReconciler;
use crate::services::token::RefreshError;
use crate::time_utils::format_utc_rfc3339;
use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Sync failure, classified by what the caller should do about it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// Nothing configured; contact the administrator.
    #[error("calendar not connected")]
    NotConnected,

    /// Refresh token rejected or refreshed token refused; administrator must reconnect.
    #[error("administrator must reconnect the calendar")]
    ReconnectRequired,

    /// Transient failure; safe to retry on the next cycle.
    #[error("calendar provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Provider refused the request for a non-auth reason.
    #[error("calendar provider error (HTTP {status}): {body}")]
    ProviderError { status: u16, body: String },

    #[error("storage error: {0}")]
    Storage(String),
}

impl SyncError {
    /// Message suitable for showing to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            SyncError::NotConnected => "Calendar is not connected. Contact the administrator.",
            SyncError::ReconnectRequired => {
                "Calendar access has expired. The administrator must reconnect the calendar."
            }
            SyncError::ProviderUnavailable(_) | SyncError::Storage(_) => {
                "Calendar is temporarily unavailable. Try again shortly."
            }
            SyncError::ProviderError { .. } => "The calendar provider rejected the request.",
        }
    }
}

impl From<CallError> for SyncError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::AuthFailed(AuthFailure::TokenRejected) => SyncError::ReconnectRequired,
            CallError::AuthFailed(AuthFailure::Refresh(refresh)) => match refresh {
                RefreshError::NoCredential | RefreshError::NotConfigured(_) => {
                    SyncError::NotConnected
                }
                RefreshError::InvalidRefreshToken => SyncError::ReconnectRequired,
                RefreshError::ProviderUnavailable(msg) => SyncError::ProviderUnavailable(msg),
                RefreshError::Storage(msg) => SyncError::Storage(msg),
            },
            CallError::ProviderError { status, body } if status == 429 || status >= 500 => {
                SyncError::ProviderUnavailable(format!("HTTP {}: {}", status, body))
            }
            CallError::ProviderError { status, body } => SyncError::ProviderError { status, body },
            CallError::Transport(msg) => SyncError::ProviderUnavailable(msg),
            CallError::Decode(msg) => {
                SyncError::ProviderUnavailable(format!("malformed provider response: {}", msg))
            }
        }
    }
}

impl From<AppError> for SyncError {
    fn from(err: AppError) -> Self {
        SyncError::Storage(err.to_string())
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::NotConnected => AppError::NotConnected,
            SyncError::ReconnectRequired => AppError::ReconnectRequired,
            SyncError::ProviderUnavailable(msg) => AppError::ProviderUnavailable(msg),
            SyncError::ProviderError { status, body } => {
                AppError::ProviderError(format!("HTTP {}: {}", status, body))
            }
            SyncError::Storage(msg) => AppError::Database(msg),
        }
    }
}

/// Result of one sync pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub calendar_id: String,
    pub total_fetched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Event details for a manual add.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub start_time: EventTime,
    pub end_time: EventTime,
}

/// Outcome of a manual add.
///
/// The event exists upstream once `remote_id` is set, even if the follow-up
/// sync failed; `sync_error` then says why the local row is not there yet.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedEvent {
    pub remote_id: String,
    pub sync: Option<SyncResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_error: Option<String>,
}

/// Longest forward window a sync may fetch.
pub const MAX_SYNC_WINDOW_DAYS: i64 = 366;

/// Orchestrates shared-calendar syncs.
#[derive(Clone)]
pub struct CalendarSyncService {
    api: CalendarApi,
    reconciler: CalendarReconciler,
    calendars: Arc<dyn CalendarStore>,
    credentials: Arc<dyn CredentialStore>,
    admin_account_id: String,
    window: Duration,
    /// Syncs hold this shared; a calendar switch holds it exclusively so no
    /// in-flight sync can write old-calendar rows after the wipe.
    switch_lock: Arc<RwLock<()>>,
}

impl CalendarSyncService {
    pub fn new(
        api: CalendarApi,
        calendars: Arc<dyn CalendarStore>,
        credentials: Arc<dyn CredentialStore>,
        admin_account_id: String,
        window_days: i64,
    ) -> Self {
        Self {
            api,
            reconciler: CalendarReconciler::new(calendars.clone()),
            calendars,
            credentials,
            admin_account_id,
            window: Duration::days(window_days.clamp(1, MAX_SYNC_WINDOW_DAYS)),
            switch_lock: Arc::new(RwLock::new(())),
        }
    }

    pub fn admin_account_id(&self) -> &str {
        &self.admin_account_id
    }

    /// Current shared calendar, defaulting to the provider's primary calendar.
    pub async fn shared_calendar(&self) -> Result<SharedCalendarSetting, SyncError> {
        Ok(self
            .calendars
            .get_shared_calendar()
            .await?
            .unwrap_or_else(|| SharedCalendarSetting {
                calendar_id: PRIMARY_CALENDAR_ID.to_string(),
                calendar_name: "Primary".to_string(),
                updated_by: String::new(),
                updated_at: String::new(),
            }))
    }

    /// Fetch the rolling window of the shared calendar and reconcile it into `owner_id`'s rows.
    pub async fn sync_shared_calendar(&self, owner_id: &str) -> Result<SyncResult, SyncError> {
        let _guard = self.switch_lock.read().await;
        self.sync_current_calendar(owner_id).await
    }

    /// Sync body; the caller holds `switch_lock`.
    async fn sync_current_calendar(&self, owner_id: &str) -> Result<SyncResult, SyncError> {
        let setting = self.shared_calendar().await?;
        let now = Utc::now();

        tracing::info!(
            owner = owner_id,
            calendar_id = %setting.calendar_id,
            "Syncing shared calendar"
        );

        let remote_events = self
            .api
            .list_events(
                &self.admin_account_id,
                &setting.calendar_id,
                now,
                now + self.window,
            )
            .await
            .map_err(|e| {
                let err = SyncError::from(e);
                tracing::warn!(owner = owner_id, error = %err, "Shared calendar fetch failed");
                err
            })?;

        // Another instance may have switched calendars while we were fetching.
        let current = self.shared_calendar().await?;
        if current.calendar_id != setting.calendar_id {
            tracing::warn!(
                owner = owner_id,
                fetched_from = %setting.calendar_id,
                current = %current.calendar_id,
                "Shared calendar changed during sync, discarding batch"
            );
            return Ok(SyncResult {
                calendar_id: current.calendar_id,
                total_fetched: remote_events.len(),
                inserted: 0,
                updated: 0,
                skipped: remote_events.len(),
                failed: 0,
            });
        }

        let summary = self.reconciler.reconcile(owner_id, &remote_events).await;

        Ok(SyncResult {
            calendar_id: setting.calendar_id,
            total_fetched: remote_events.len(),
            inserted: summary.inserted,
            updated: summary.updated,
            skipped: summary.skipped,
            failed: summary.failed,
        })
    }

    /// Point the shared calendar at `calendar_id`, then resync into `owner_id`'s rows.
    ///
    /// Switching to a different calendar deletes every user's rows first, since
    /// remote IDs from the old calendar can never match again. The delete and
    /// the resync are not atomic: if the resync fails, storage stays empty until
    /// the next successful sync. Syncs already running finish before the wipe,
    /// and syncs started meanwhile wait for the switch.
    pub async fn select_calendar(
        &self,
        updated_by: &str,
        calendar_id: &str,
        calendar_name: &str,
        owner_id: &str,
    ) -> Result<SyncResult, SyncError> {
        let _guard = self.switch_lock.write().await;
        let current = self.shared_calendar().await?;

        if current.calendar_id != calendar_id {
            let deleted = self.calendars.delete_all_events().await?;
            tracing::warn!(
                from = %current.calendar_id,
                to = calendar_id,
                deleted,
                "Shared calendar changed, wiped local events"
            );
        }

        self.calendars
            .set_shared_calendar(&SharedCalendarSetting {
                calendar_id: calendar_id.to_string(),
                calendar_name: calendar_name.to_string(),
                updated_by: updated_by.to_string(),
                updated_at: format_utc_rfc3339(Utc::now()),
            })
            .await?;

        self.sync_current_calendar(owner_id).await
    }

    /// Create an event on the shared calendar, then sync so it comes back with its remote ID.
    ///
    /// Fails only if the upstream create fails. A failed follow-up sync is
    /// reported in the result so callers do not retry and create a duplicate.
    pub async fn create_event(
        &self,
        owner_id: &str,
        event: NewEvent,
    ) -> Result<CreatedEvent, SyncError> {
        let setting = self.shared_calendar().await?;

        let created = self
            .api
            .create_event(
                &self.admin_account_id,
                &setting.calendar_id,
                &NewRemoteEvent {
                    summary: event.title,
                    description: event.description,
                    start: event.start_time.to_remote(),
                    end: event.end_time.to_remote(),
                },
            )
            .await?;

        tracing::info!(
            owner = owner_id,
            remote_id = %created.id,
            "Created event on shared calendar"
        );

        let (sync, sync_error) = match self.sync_shared_calendar(owner_id).await {
            Ok(result) => (Some(result), None),
            Err(e) => {
                tracing::warn!(
                    owner = owner_id,
                    remote_id = %created.id,
                    error = %e,
                    "Event created but follow-up sync failed"
                );
                (None, Some(e.user_message().to_string()))
            }
        };

        Ok(CreatedEvent {
            remote_id: created.id,
            sync,
            sync_error,
        })
    }

    /// Calendars the administrator's account can see.
    pub async fn list_calendars(&self) -> Result<Vec<RemoteCalendar>, SyncError> {
        Ok(self.api.list_calendars(&self.admin_account_id).await?)
    }

    /// State of the administrator's calendar credential.
    pub async fn connection_state(&self) -> Result<ConnectionState, SyncError> {
        let credential = self
            .credentials
            .get_credential(&self.admin_account_id, Provider::GoogleCalendar)
            .await?;
        Ok(ConnectionState::of(credential.as_ref(), Utc::now()))
    }

    /// Sync each user on a fixed interval, forever. Failures are logged and
    /// retried on the next tick.
    pub async fn run_auto_sync(self, interval: std::time::Duration, users: Vec<String>) {
        let interval = interval.max(std::time::Duration::from_secs(1));
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!(
            interval_secs = interval.as_secs(),
            users = users.len(),
            "Auto-sync started"
        );

        loop {
            ticker.tick().await;
            for user in &users {
                match self.sync_shared_calendar(user).await {
                    Ok(result) => tracing::info!(
                        owner = %user,
                        fetched = result.total_fetched,
                        inserted = result.inserted,
                        updated = result.updated,
                        "Auto-sync complete"
                    ),
                    Err(e) => tracing::warn!(
                        owner = %user,
                        error = %e,
                        "Auto-sync failed, will retry next cycle"
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_refresh_token_requires_reconnect() {
        let err: SyncError = CallError::from(RefreshError::InvalidRefreshToken).into();
        assert_eq!(err, SyncError::ReconnectRequired);

        let err: SyncError = CallError::AuthFailed(AuthFailure::TokenRejected).into();
        assert_eq!(err, SyncError::ReconnectRequired);
    }

    #[test]
    fn test_transient_failures_are_retryable() {
        let err: SyncError =
            CallError::from(RefreshError::ProviderUnavailable("503".to_string())).into();
        assert!(matches!(err, SyncError::ProviderUnavailable(_)));

        let err: SyncError = CallError::Transport("timed out".to_string()).into();
        assert!(matches!(err, SyncError::ProviderUnavailable(_)));

        let err: SyncError = CallError::ProviderError {
            status: 503,
            body: String::new(),
        }
        .into();
        assert!(matches!(err, SyncError::ProviderUnavailable(_)));
    }

    #[test]
    fn test_client_errors_are_not_retried() {
        let err: SyncError = CallError::ProviderError {
            status: 404,
            body: "notFound".to_string(),
        }
        .into();
        assert_eq!(
            err,
            SyncError::ProviderError {
                status: 404,
                body: "notFound".to_string()
            }
        );
    }

    #[test]
    fn test_missing_credential_is_not_connected() {
        let err: SyncError = CallError::from(RefreshError::NoCredential).into();
        assert_eq!(err, SyncError::NotConnected);
        assert_ne!(
            SyncError::ReconnectRequired.user_message(),
            SyncError::ProviderUnavailable(String::new()).user_message()
        );
    }
}

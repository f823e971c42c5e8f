// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistence boundary.
//!
//! Services depend on the [`CredentialStore`] and [`CalendarStore`] traits.
//! [`FirestoreDb`] backs production; [`MemoryDb`] backs tests and local runs.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{CalendarEvent, Credential, Provider, SharedCalendarSetting};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const CREDENTIALS: &str = "credentials";
    pub const CALENDAR_EVENTS: &str = "calendar_events";
    pub const SETTINGS: &str = "settings";
    /// Document ID of the shared calendar setting within `settings`
    pub const SHARED_CALENDAR_DOC: &str = "shared_calendar";
}

/// Stored OAuth credentials keyed by (account, provider).
///
/// `put_credential` replaces the whole record; concurrent writers resolve by
/// last-write-wins.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_credential(
        &self,
        account_id: &str,
        provider: Provider,
    ) -> Result<Option<Credential>, AppError>;

    async fn put_credential(&self, credential: &Credential) -> Result<(), AppError>;
}

/// Local calendar event rows and the shared calendar setting.
#[async_trait]
pub trait CalendarStore: Send + Sync {
    /// Look up a row by its (owner, remote_id) reconciliation key.
    async fn get_event(
        &self,
        owner_id: &str,
        remote_id: &str,
    ) -> Result<Option<CalendarEvent>, AppError>;

    /// Insert or replace the row with `event.id`.
    async fn upsert_event(&self, event: &CalendarEvent) -> Result<(), AppError>;

    /// All rows owned by a user.
    async fn list_events(&self, owner_id: &str) -> Result<Vec<CalendarEvent>, AppError>;

    /// Delete every row for every user. Returns the number deleted.
    async fn delete_all_events(&self) -> Result<usize, AppError>;

    async fn get_shared_calendar(&self) -> Result<Option<SharedCalendarSetting>, AppError>;

    async fn set_shared_calendar(&self, setting: &SharedCalendarSetting) -> Result<(), AppError>;
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store for tests and local development.

use super::{CalendarStore, CredentialStore};
use crate::error::AppError;
use crate::models::{CalendarEvent, Credential, Provider, SharedCalendarSetting};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{Arc, RwLock};

/// DashMap-backed store. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryDb {
    credentials: Arc<DashMap<String, Credential>>,
    events: Arc<DashMap<String, CalendarEvent>>,
    shared_calendar: Arc<RwLock<Option<SharedCalendarSetting>>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored event rows across all users.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryDb {
    async fn get_credential(
        &self,
        account_id: &str,
        provider: Provider,
    ) -> Result<Option<Credential>, AppError> {
        Ok(self
            .credentials
            .get(&Credential::key(account_id, provider))
            .map(|c| c.clone()))
    }

    async fn put_credential(&self, credential: &Credential) -> Result<(), AppError> {
        self.credentials
            .insert(credential.document_id(), credential.clone());
        Ok(())
    }
}

#[async_trait]
impl CalendarStore for MemoryDb {
    async fn get_event(
        &self,
        owner_id: &str,
        remote_id: &str,
    ) -> Result<Option<CalendarEvent>, AppError> {
        Ok(self
            .events
            .get(&CalendarEvent::key(owner_id, remote_id))
            .map(|e| e.clone()))
    }

    async fn upsert_event(&self, event: &CalendarEvent) -> Result<(), AppError> {
        self.events.insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn list_events(&self, owner_id: &str) -> Result<Vec<CalendarEvent>, AppError> {
        Ok(self
            .events
            .iter()
            .filter(|e| e.owner_id == owner_id)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn delete_all_events(&self) -> Result<usize, AppError> {
        let count = self.events.len();
        self.events.clear();
        Ok(count)
    }

    async fn get_shared_calendar(&self) -> Result<Option<SharedCalendarSetting>, AppError> {
        self.shared_calendar
            .read()
            .map(|s| s.clone())
            .map_err(|_| AppError::Database("shared calendar lock poisoned".to_string()))
    }

    async fn set_shared_calendar(&self, setting: &SharedCalendarSetting) -> Result<(), AppError> {
        let mut guard = self
            .shared_calendar
            .write()
            .map_err(|_| AppError::Database("shared calendar lock poisoned".to_string()))?;
        *guard = Some(setting.clone());
        Ok(())
    }
}

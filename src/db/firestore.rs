// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Credentials (OAuth tokens per account and provider)
//! - Calendar events (reconciled rows keyed by owner and remote ID)
//! - Settings (the shared calendar singleton)

use super::{CalendarStore, CredentialStore};
use crate::db::collections;
use crate::error::AppError;
use crate::models::{CalendarEvent, Credential, Provider, SharedCalendarSetting};
use async_trait::async_trait;

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    /// Helper to batch delete documents using transactions.
    async fn batch_delete(&self, collection: &str, doc_ids: &[String]) -> Result<(), AppError> {
        for chunk in doc_ids.chunks(BATCH_SIZE) {
            let mut transaction = self
                .client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for doc_id in chunk {
                self.client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }
}

// ─── Credential Operations ───────────────────────────────────

#[async_trait]
impl CredentialStore for FirestoreDb {
    async fn get_credential(
        &self,
        account_id: &str,
        provider: Provider,
    ) -> Result<Option<Credential>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::CREDENTIALS)
            .obj()
            .one(&Credential::key(account_id, provider))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Replaces the whole document, so concurrent refreshes never interleave fields.
    async fn put_credential(&self, credential: &Credential) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::CREDENTIALS)
            .document_id(credential.document_id())
            .object(credential)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

// ─── Calendar Operations ─────────────────────────────────────

#[async_trait]
impl CalendarStore for FirestoreDb {
    async fn get_event(
        &self,
        owner_id: &str,
        remote_id: &str,
    ) -> Result<Option<CalendarEvent>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::CALENDAR_EVENTS)
            .obj()
            .one(&CalendarEvent::key(owner_id, remote_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_event(&self, event: &CalendarEvent) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::CALENDAR_EVENTS)
            .document_id(&event.id)
            .object(event)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_events(&self, owner_id: &str) -> Result<Vec<CalendarEvent>, AppError> {
        let owner_id = owner_id.to_string();
        self.client
            .fluent()
            .select()
            .from(collections::CALENDAR_EVENTS)
            .filter(move |q| q.for_all([q.field("owner_id").eq(owner_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn delete_all_events(&self) -> Result<usize, AppError> {
        let events: Vec<CalendarEvent> = self
            .client
            .fluent()
            .select()
            .from(collections::CALENDAR_EVENTS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let doc_ids: Vec<String> = events.into_iter().map(|e| e.id).collect();
        self.batch_delete(collections::CALENDAR_EVENTS, &doc_ids)
            .await?;

        tracing::info!(count = doc_ids.len(), "Deleted all calendar events");
        Ok(doc_ids.len())
    }

    async fn get_shared_calendar(&self) -> Result<Option<SharedCalendarSetting>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::SETTINGS)
            .obj()
            .one(collections::SHARED_CALENDAR_DOC)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn set_shared_calendar(&self, setting: &SharedCalendarSetting) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::SETTINGS)
            .document_id(collections::SHARED_CALENDAR_DOC)
            .object(setting)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

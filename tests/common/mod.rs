// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{DateTime, Utc};
use std::sync::Arc;
use wellness_sync::config::Config;
use wellness_sync::db::{CredentialStore, FirestoreDb, MemoryDb};
use wellness_sync::models::{Credential, EventTime, Provider, RemoteEventTime};
use wellness_sync::routes::create_router;
use wellness_sync::services::{http_client, AuthenticatedClient, TokenRefresher};
use wellness_sync::AppState;
use wiremock::MockServer;

pub const ADMIN: &str = "admin";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Connect to the Firestore emulator.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Config whose provider endpoints point at `server`.
#[allow(dead_code)]
pub fn mock_config(server: &MockServer) -> Config {
    Config::test_default().with_provider_base(&server.uri())
}

/// Admin calendar credential expiring at `expires_at`.
#[allow(dead_code)]
pub fn admin_credential(access_token: &str, expires_at: Option<DateTime<Utc>>) -> Credential {
    Credential {
        account_id: ADMIN.to_string(),
        provider: Provider::GoogleCalendar,
        access_token: access_token.to_string(),
        refresh_token: "refresh-1".to_string(),
        expires_at,
        is_active: true,
        updated_at: "2024-06-01T00:00:00Z".to_string(),
    }
}

/// Store an admin calendar credential.
#[allow(dead_code)]
pub async fn seed_credential(
    db: &MemoryDb,
    access_token: &str,
    expires_at: Option<DateTime<Utc>>,
) -> Credential {
    let credential = admin_credential(access_token, expires_at);
    db.put_credential(&credential).await.unwrap();
    credential
}

/// Stored admin calendar credential.
#[allow(dead_code)]
pub async fn stored_credential(db: &MemoryDb) -> Credential {
    db.get_credential(ADMIN, Provider::GoogleCalendar)
        .await
        .unwrap()
        .expect("credential should exist")
}

/// Token endpoint success body.
#[allow(dead_code)]
pub fn token_body(access_token: &str, expires_in: i64) -> serde_json::Value {
    serde_json::json!({
        "access_token": access_token,
        "expires_in": expires_in,
        "token_type": "Bearer"
    })
}

/// Refresher and executor over `db`, configured with `config`.
#[allow(dead_code)]
pub fn executor(config: Config, db: &MemoryDb) -> (TokenRefresher, AuthenticatedClient) {
    let http = http_client(config.http_timeout).unwrap();
    let store: Arc<dyn CredentialStore> = Arc::new(db.clone());
    let refresher = TokenRefresher::new(http.clone(), store.clone(), Arc::new(config));
    let client = AuthenticatedClient::new(http, store, refresher.clone());
    (refresher, client)
}

/// Application state over a fresh in-memory store.
#[allow(dead_code)]
pub fn test_state(config: Config) -> (Arc<AppState>, MemoryDb) {
    let db = MemoryDb::new();
    let state = AppState::new(config, Arc::new(db.clone()), Arc::new(db.clone())).unwrap();
    (Arc::new(state), db)
}

/// Router plus state, with provider endpoints that are never reached.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, MemoryDb) {
    let (state, db) = test_state(Config::test_default());
    (create_router(state.clone()), state, db)
}

/// Create a session JWT for `user_id`.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, signing_key: &[u8]) -> String {
    wellness_sync::middleware::auth::create_jwt(user_id, signing_key).unwrap()
}

/// Google-shaped event list page.
#[allow(dead_code)]
pub fn events_page(items: serde_json::Value, next_page_token: Option<&str>) -> serde_json::Value {
    let mut page = serde_json::json!({ "kind": "calendar#events", "items": items });
    if let Some(token) = next_page_token {
        page["nextPageToken"] = serde_json::Value::String(token.to_string());
    }
    page
}

/// All-day event time for `YYYY-MM-DD`.
#[allow(dead_code)]
pub fn all_day(date: &str) -> EventTime {
    EventTime::from_remote(&RemoteEventTime {
        date: Some(date.to_string()),
        ..Default::default()
    })
    .unwrap()
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Loaded once at startup. Provider client secrets live here and are handed
//! to the token refresher; nothing else reads them.

use crate::models::Provider;
use crate::services::sync::MAX_SYNC_WINDOW_DAYS;
use std::env;
use std::time::Duration;

const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_GOOGLE_CALENDAR_API_URL: &str = "https://www.googleapis.com/calendar/v3";
const DEFAULT_FITBIT_TOKEN_URL: &str = "https://api.fitbit.com/oauth2/token";

/// OAuth client registration for one provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Token endpoint used for both code exchange and refresh.
    pub token_url: String,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Account whose credential backs the shared calendar.
    pub admin_account_id: String,
    /// Calendar provider OAuth client
    pub google: ProviderConfig,
    /// Calendar provider consent screen
    pub google_auth_url: String,
    /// Calendar API base URL
    pub google_calendar_api_url: String,
    /// Fitness provider OAuth client (optional)
    pub fitbit: Option<ProviderConfig>,
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    /// GCP project ID (`memory` selects the in-process store)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Timeout applied to every outbound HTTP call
    pub http_timeout: Duration,
    /// Period of the background auto-sync
    pub sync_interval: Duration,
    /// How many days ahead of now a sync fetches
    pub sync_window_days: i64,
    /// Users the background auto-sync reconciles into
    pub auto_sync_users: Vec<String>,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for the OAuth state parameter (raw bytes)
    pub oauth_state_key: Vec<u8>,
}

impl Config {
    /// Deterministic configuration for tests.
    pub fn test_default() -> Self {
        Self {
            admin_account_id: "admin".to_string(),
            google: ProviderConfig {
                client_id: "test_client_id".to_string(),
                client_secret: "test_secret".to_string(),
                token_url: "http://127.0.0.1:9/token".to_string(),
            },
            google_auth_url: DEFAULT_GOOGLE_AUTH_URL.to_string(),
            google_calendar_api_url: "http://127.0.0.1:9/calendar/v3".to_string(),
            fitbit: None,
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "memory".to_string(),
            port: 8080,
            http_timeout: Duration::from_secs(5),
            sync_interval: Duration::from_secs(900),
            sync_window_days: 7,
            auto_sync_users: vec!["admin".to_string()],
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_oauth_state_key".to_vec(),
        }
    }

    /// Point every provider endpoint at a single base URL (mock servers).
    pub fn with_provider_base(mut self, base: &str) -> Self {
        self.google.token_url = format!("{}/token", base);
        self.google_calendar_api_url = format!("{}/calendar/v3", base);
        if let Some(fitbit) = self.fitbit.as_mut() {
            fitbit.token_url = format!("{}/fitbit/token", base);
        }
        self
    }

    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let admin_account_id = required("ADMIN_ACCOUNT_ID")?;

        let fitbit = match (env::var("FITBIT_CLIENT_ID"), env::var("FITBIT_CLIENT_SECRET")) {
            (Ok(client_id), Ok(client_secret)) => Some(ProviderConfig {
                client_id,
                client_secret: client_secret.trim().to_string(),
                token_url: env::var("FITBIT_TOKEN_URL")
                    .unwrap_or_else(|_| DEFAULT_FITBIT_TOKEN_URL.to_string()),
            }),
            _ => None,
        };

        let auto_sync_users = env::var("AUTO_SYNC_USERS")
            .map(|v| parse_list(&v))
            .ok()
            .filter(|users| !users.is_empty())
            .unwrap_or_else(|| vec![admin_account_id.clone()]);

        let sync_interval_secs: u64 = parse_or("SYNC_INTERVAL_SECS", 900);
        if sync_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "SYNC_INTERVAL_SECS",
                reason: "must be at least 1 second".to_string(),
            });
        }

        let sync_window_days: i64 = parse_or("SYNC_WINDOW_DAYS", 7);
        if !(1..=MAX_SYNC_WINDOW_DAYS).contains(&sync_window_days) {
            return Err(ConfigError::Invalid {
                name: "SYNC_WINDOW_DAYS",
                reason: format!("must be between 1 and {} days", MAX_SYNC_WINDOW_DAYS),
            });
        }

        Ok(Self {
            google: ProviderConfig {
                client_id: required("GOOGLE_CLIENT_ID")?,
                client_secret: required("GOOGLE_CLIENT_SECRET")?.trim().to_string(),
                token_url: env::var("GOOGLE_TOKEN_URL")
                    .unwrap_or_else(|_| DEFAULT_GOOGLE_TOKEN_URL.to_string()),
            },
            google_auth_url: env::var("GOOGLE_AUTH_URL")
                .unwrap_or_else(|_| DEFAULT_GOOGLE_AUTH_URL.to_string()),
            google_calendar_api_url: env::var("GOOGLE_CALENDAR_API_URL")
                .unwrap_or_else(|_| DEFAULT_GOOGLE_CALENDAR_API_URL.to_string()),
            fitbit,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: parse_or("PORT", 8080),
            http_timeout: Duration::from_secs(parse_or("HTTP_TIMEOUT_SECS", 15)),
            sync_interval: Duration::from_secs(sync_interval_secs),
            sync_window_days,
            auto_sync_users,
            jwt_signing_key: required("JWT_SIGNING_KEY")?.into_bytes(),
            oauth_state_key: required("OAUTH_STATE_KEY")?.into_bytes(),
            admin_account_id,
        })
    }

    /// OAuth client registration for a provider, if configured.
    pub fn provider(&self, provider: Provider) -> Option<&ProviderConfig> {
        match provider {
            Provider::GoogleCalendar => Some(&self.google),
            Provider::Fitbit => self.fitbit.as_ref(),
        }
    }

    /// Whether the given account is the administrator.
    pub fn is_admin(&self, account: &str) -> bool {
        self.admin_account_id == account
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth credential model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Margin before expiry when an access token is no longer trusted (5 minutes).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Third-party providers whose tokens we manage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    GoogleCalendar,
    Fitbit,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::GoogleCalendar => "google_calendar",
            Provider::Fitbit => "fitbit",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored OAuth credential, one per (account, provider).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Owning account
    pub account_id: String,
    pub provider: Provider,
    /// Bearer token for resource calls; empty when cleared
    pub access_token: String,
    /// Long-lived token used to mint new access tokens
    pub refresh_token: String,
    /// None means already expired
    pub expires_at: Option<DateTime<Utc>>,
    /// False once the provider has rejected the refresh token
    pub is_active: bool,
    /// Last write (ISO 8601)
    pub updated_at: String,
}

impl Credential {
    /// Storage key for an (account, provider) pair.
    pub fn key(account_id: &str, provider: Provider) -> String {
        format!("{}:{}", account_id, provider.as_str())
    }

    pub fn document_id(&self) -> String {
        Self::key(&self.account_id, self.provider)
    }

    /// True if the access token must be refreshed before use at `now`.
    ///
    /// Tokens expiring within the margin (inclusive) count as expired.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return true;
        }
        match self.expires_at {
            Some(expires_at) => expires_at <= now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS),
            None => true,
        }
    }

    /// Clear the access token after the provider rejected the refresh token.
    pub fn mark_expired(&mut self, now: DateTime<Utc>) {
        self.access_token.clear();
        self.expires_at = Some(now);
        self.is_active = false;
        self.updated_at = crate::time_utils::format_utc_rfc3339(now);
    }
}

/// Observable state of a provider connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No credential stored
    Disconnected,
    /// Access token valid beyond the refresh margin
    Connected,
    /// Access token stale, refresh token still usable
    ExpiredButRefreshable,
    /// Refresh token rejected; needs a new authorization
    RefreshFailed,
}

impl ConnectionState {
    pub fn of(credential: Option<&Credential>, now: DateTime<Utc>) -> Self {
        match credential {
            None => ConnectionState::Disconnected,
            Some(c) if !c.is_active || c.refresh_token.is_empty() => ConnectionState::RefreshFailed,
            Some(c) if c.needs_refresh(now) => ConnectionState::ExpiredButRefreshable,
            Some(_) => ConnectionState::Connected,
        }
    }
}

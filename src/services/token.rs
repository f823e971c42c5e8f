// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth token refresher.
//!
//! Exchanges a stored refresh token for a new access token at the provider's
//! token endpoint and writes the result back to the credential store.
//!
//! Concurrent refreshes for the same credential are not serialized: each one
//! is independently valid and the last write wins. Callers must not assume
//! their own refresh produced the token currently stored.

use crate::config::Config;
use crate::db::CredentialStore;
use crate::models::{Credential, Provider};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;

/// Why a refresh did not produce an access token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    /// No credential stored, or it has no refresh token.
    #[error("no credential configured")]
    NoCredential,

    /// The provider has no client registration in this process.
    #[error("provider {0} is not configured")]
    NotConfigured(Provider),

    /// The provider rejected the refresh token. Fatal until re-authorized.
    #[error("refresh token rejected by provider")]
    InvalidRefreshToken,

    /// Network failure or non-400 error from the token endpoint.
    #[error("token endpoint unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("credential storage failed: {0}")]
    Storage(String),
}

impl RefreshError {
    /// Whether trying again later may succeed without human action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RefreshError::ProviderUnavailable(_) | RefreshError::Storage(_)
        )
    }
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: i64,
    /// Present when the provider rotates refresh tokens
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Longest access token lifetime accepted from a provider.
const MAX_TOKEN_LIFETIME_SECS: i64 = 366 * 24 * 60 * 60;

impl TokenResponse {
    /// Absolute expiry of the issued token, measured from `now`.
    ///
    /// Negative or implausibly long lifetimes are treated as a broken
    /// token endpoint.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, RefreshError> {
        if !(0..=MAX_TOKEN_LIFETIME_SECS).contains(&self.expires_in) {
            return Err(RefreshError::ProviderUnavailable(format!(
                "token endpoint returned invalid expires_in: {}",
                self.expires_in
            )));
        }
        Duration::try_seconds(self.expires_in)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                RefreshError::ProviderUnavailable(format!(
                    "token expiry out of range: {}",
                    self.expires_in
                ))
            })
    }
}

/// Refreshes and stores provider access tokens.
#[derive(Clone)]
pub struct TokenRefresher {
    http: reqwest::Client,
    store: Arc<dyn CredentialStore>,
    config: Arc<Config>,
}

impl TokenRefresher {
    pub fn new(http: reqwest::Client, store: Arc<dyn CredentialStore>, config: Arc<Config>) -> Self {
        Self {
            http,
            store,
            config,
        }
    }

    /// Mint a new access token for `(account_id, provider)` and persist it.
    pub async fn refresh(&self, account_id: &str, provider: Provider) -> Result<String, RefreshError> {
        let mut credential = self
            .store
            .get_credential(account_id, provider)
            .await
            .map_err(|e| RefreshError::Storage(e.to_string()))?
            .ok_or(RefreshError::NoCredential)?;

        if credential.refresh_token.is_empty() {
            return Err(RefreshError::NoCredential);
        }

        if !credential.is_active {
            tracing::debug!(
                account = account_id,
                %provider,
                "Credential inactive, skipping refresh"
            );
            return Err(RefreshError::InvalidRefreshToken);
        }

        let client = self
            .config
            .provider(provider)
            .ok_or(RefreshError::NotConfigured(provider))?;

        tracing::info!(account = account_id, %provider, "Refreshing access token");

        let response = self
            .http
            .post(&client.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", credential.refresh_token.as_str()),
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                RefreshError::ProviderUnavailable(format!("Token refresh request failed: {}", e))
            })?;

        let status = response.status();

        if status == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                account = account_id,
                %provider,
                body = %body,
                "Refresh token rejected, marking credential expired"
            );

            credential.mark_expired(Utc::now());
            self.store
                .put_credential(&credential)
                .await
                .map_err(|e| RefreshError::Storage(e.to_string()))?;

            return Err(RefreshError::InvalidRefreshToken);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                account = account_id,
                %provider,
                status = status.as_u16(),
                "Token endpoint returned an error"
            );
            return Err(RefreshError::ProviderUnavailable(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let tokens: TokenResponse = response.json().await.map_err(|e| {
            RefreshError::ProviderUnavailable(format!("Failed to parse token response: {}", e))
        })?;

        let now = Utc::now();
        let expires_at = tokens.expires_at(now)?;
        credential.access_token = tokens.access_token.clone();
        credential.expires_at = Some(expires_at);
        if let Some(rotated) = tokens.refresh_token.filter(|t| !t.is_empty()) {
            credential.refresh_token = rotated;
        }
        credential.updated_at = format_utc_rfc3339(now);

        self.store
            .put_credential(&credential)
            .await
            .map_err(|e| RefreshError::Storage(e.to_string()))?;

        tracing::info!(
            account = account_id,
            %provider,
            expires_in = tokens.expires_in,
            "Access token refreshed"
        );

        Ok(tokens.access_token)
    }

    /// Exchange an authorization code for a fresh credential and store it.
    ///
    /// Used by the OAuth callback. Keeps the previously stored refresh token
    /// if the provider does not issue a new one.
    pub async fn exchange_code(
        &self,
        account_id: &str,
        provider: Provider,
        code: &str,
        redirect_uri: &str,
    ) -> Result<Credential, RefreshError> {
        let client = self
            .config
            .provider(provider)
            .ok_or(RefreshError::NotConfigured(provider))?;

        let response = self
            .http
            .post(&client.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| RefreshError::ProviderUnavailable(format!("Token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Authorization code exchange failed");
            return Err(RefreshError::ProviderUnavailable(format!(
                "Token exchange failed with status {}",
                status
            )));
        }

        let tokens: TokenResponse = response.json().await.map_err(|e| {
            RefreshError::ProviderUnavailable(format!("Failed to parse token response: {}", e))
        })?;

        let now = Utc::now();
        let expires_at = tokens.expires_at(now)?;

        let previous_refresh = self
            .store
            .get_credential(account_id, provider)
            .await
            .map_err(|e| RefreshError::Storage(e.to_string()))?
            .map(|c| c.refresh_token);

        let refresh_token = tokens
            .refresh_token
            .filter(|t| !t.is_empty())
            .or(previous_refresh)
            .unwrap_or_default();

        let credential = Credential {
            account_id: account_id.to_string(),
            provider,
            access_token: tokens.access_token,
            is_active: !refresh_token.is_empty(),
            refresh_token,
            expires_at: Some(expires_at),
            updated_at: format_utc_rfc3339(now),
        };

        self.store
            .put_credential(&credential)
            .await
            .map_err(|e| RefreshError::Storage(e.to_string()))?;

        tracing::info!(account = account_id, %provider, "Provider connected");
        Ok(credential)
    }
}

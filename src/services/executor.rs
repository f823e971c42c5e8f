// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authenticated call executor.
//!
//! Every outbound call to a token-protected provider resource goes through
//! [`AuthenticatedClient::call`]:
//! 1. Pre-flight: refresh if the stored token is empty or expires within the margin
//! 2. Send with `Authorization: Bearer`
//! 3. On 401, refresh once and retry once
//!
//! A logical call makes at most one 401-triggered refresh and one retry.

use crate::db::CredentialStore;
use crate::models::Provider;
use crate::services::token::{RefreshError, TokenRefresher};
use chrono::Utc;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Why an authenticated call could not be authorized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    /// A refresh attempt failed.
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// The provider still answered 401 after a successful refresh.
    #[error("provider rejected the refreshed access token")]
    TokenRejected,
}

/// Outcome of a failed authenticated call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    #[error("authentication failed: {0}")]
    AuthFailed(#[from] AuthFailure),

    /// Non-auth error status from the resource endpoint. Not retried.
    #[error("provider returned HTTP {status}: {body}")]
    ProviderError { status: u16, body: String },

    /// The request never produced a response (network error, timeout).
    #[error("request failed: {0}")]
    Transport(String),

    /// 2xx response whose body could not be parsed.
    #[error("failed to decode provider response: {0}")]
    Decode(String),
}

impl From<RefreshError> for CallError {
    fn from(err: RefreshError) -> Self {
        CallError::AuthFailed(AuthFailure::Refresh(err))
    }
}

/// A provider request that can be re-issued with a different token.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    url: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Executes provider requests on behalf of a credential owner.
#[derive(Clone)]
pub struct AuthenticatedClient {
    http: reqwest::Client,
    store: Arc<dyn CredentialStore>,
    refresher: TokenRefresher,
}

impl AuthenticatedClient {
    pub fn new(
        http: reqwest::Client,
        store: Arc<dyn CredentialStore>,
        refresher: TokenRefresher,
    ) -> Self {
        Self {
            http,
            store,
            refresher,
        }
    }

    pub fn refresher(&self) -> &TokenRefresher {
        &self.refresher
    }

    /// Issue `request` with the credential of `(account_id, provider)`.
    ///
    /// Returns the successful response; any non-2xx outcome is a [`CallError`].
    pub async fn call(
        &self,
        account_id: &str,
        provider: Provider,
        request: &ApiRequest,
    ) -> Result<reqwest::Response, CallError> {
        let access_token = self.preflight_token(account_id, provider).await?;

        let response = self.send(request, &access_token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_response(response).await;
        }

        // The provider is authoritative: refresh even if the token looked valid.
        tracing::info!(
            account = account_id,
            %provider,
            url = %request.url,
            "Provider returned 401, refreshing and retrying once"
        );
        let access_token = self.refresher.refresh(account_id, provider).await?;

        let retried = self.send(request, &access_token).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(
                account = account_id,
                %provider,
                url = %request.url,
                "Provider rejected refreshed token"
            );
            return Err(AuthFailure::TokenRejected.into());
        }

        check_response(retried).await
    }

    /// [`call`](Self::call) and parse the JSON body.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        account_id: &str,
        provider: Provider,
        request: &ApiRequest,
    ) -> Result<T, CallError> {
        self.call(account_id, provider, request)
            .await?
            .json()
            .await
            .map_err(|e| CallError::Decode(e.to_string()))
    }

    /// Stored access token, refreshed first if it cannot be trusted.
    async fn preflight_token(
        &self,
        account_id: &str,
        provider: Provider,
    ) -> Result<String, CallError> {
        let credential = self
            .store
            .get_credential(account_id, provider)
            .await
            .map_err(|e| RefreshError::Storage(e.to_string()))?
            .ok_or(RefreshError::NoCredential)?;

        if !credential.needs_refresh(Utc::now()) {
            return Ok(credential.access_token);
        }

        tracing::debug!(
            account = account_id,
            %provider,
            "Access token missing or expiring, refreshing before call"
        );
        Ok(self.refresher.refresh(account_id, provider).await?)
    }

    async fn send(
        &self,
        request: &ApiRequest,
        access_token: &str,
    ) -> Result<reqwest::Response, CallError> {
        let mut builder = self
            .http
            .request(request.method.clone(), &request.url)
            .bearer_auth(access_token);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        builder
            .send()
            .await
            .map_err(|e| CallError::Transport(e.to_string()))
    }
}

/// Map a non-401 response to success or [`CallError::ProviderError`].
async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, CallError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status == StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!("Provider rate limit hit (429)");
    }

    Err(CallError::ProviderError {
        status: status.as_u16(),
        body,
    })
}

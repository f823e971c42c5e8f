// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Calendar provider OAuth routes.
//!
//! The administrator starts the flow from the dashboard; the provider
//! redirects back to the callback, which writes the credential straight to
//! the credential store. The frontend learns the result by polling
//! `/api/calendar/status`.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Redirect,
    routing::get,
    Extension, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::Provider;
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// OAuth scope for reading and creating calendar events.
const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// How long a signed state parameter stays valid.
const STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;

/// Public routes (provider redirect target).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/google/callback", get(auth_callback))
}

/// Routes that require a session.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/google", get(auth_start))
}

/// Query parameters for starting OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Frontend URL to redirect back to after OAuth completes.
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Start OAuth flow - redirect to the provider consent screen.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<AuthStartParams>,
    headers: HeaderMap,
) -> Result<Redirect> {
    user.require_admin(&state.config)?;

    let frontend_url = params
        .redirect_uri
        .unwrap_or_else(|| state.config.frontend_url.clone());

    let timestamp = now_millis()?;
    let oauth_state = sign_state(
        &user.user_id,
        timestamp,
        &frontend_url,
        &state.config.oauth_state_key,
    )?;

    let callback_url = callback_url(&headers);

    let auth_url = format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
        state.config.google_auth_url,
        urlencoding::encode(&state.config.google.client_id),
        urlencoding::encode(&callback_url),
        urlencoding::encode(CALENDAR_SCOPE),
        oauth_state
    );

    tracing::info!(
        account = %user.user_id,
        frontend_url = %frontend_url,
        "Starting calendar OAuth flow"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    state: String,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens and store the admin credential.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    let now = now_millis()?;
    let verified = verify_and_decode_state(&params.state, &state.config.oauth_state_key, now);

    let Some(verified) = verified else {
        tracing::warn!("Invalid, expired or tampered OAuth state parameter");
        return Ok(redirect_with(&state.config.frontend_url, "error", "invalid_state"));
    };

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from provider");
        return Ok(redirect_with(&verified.frontend_url, "error", &error));
    }

    if !state.config.is_admin(&verified.account_id) {
        tracing::warn!(account = %verified.account_id, "OAuth callback for non-admin account");
        return Ok(redirect_with(&verified.frontend_url, "error", "forbidden"));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    match state
        .refresher
        .exchange_code(
            &verified.account_id,
            Provider::GoogleCalendar,
            &code,
            &callback_url(&headers),
        )
        .await
    {
        Ok(_) => Ok(redirect_with(&verified.frontend_url, "connected", "1")),
        Err(e) => {
            tracing::error!(error = %e, "Failed to exchange authorization code");
            Ok(redirect_with(&verified.frontend_url, "error", "exchange_failed"))
        }
    }
}

fn redirect_with(frontend_url: &str, key: &str, value: &str) -> Redirect {
    let separator = if frontend_url.contains('?') { '&' } else { '?' };
    Redirect::temporary(&format!(
        "{}{}{}={}",
        frontend_url,
        separator,
        key,
        urlencoding::encode(value)
    ))
}

/// Callback URL derived from the request host.
fn callback_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| {
            std::env::var("API_HOST").unwrap_or_else(|_| "localhost:8080".to_string())
        });

    let scheme = if host.contains("localhost") || host.contains("127.0.0.1") {
        "http"
    } else {
        "https"
    };

    format!("{}://{}/auth/google/callback", scheme, host)
}

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

/// Decoded contents of a verified state parameter.
#[derive(Debug, PartialEq)]
struct VerifiedState {
    account_id: String,
    frontend_url: String,
}

/// Build the signed state: base64("account|timestamp_hex|frontend_url|signature_hex").
fn sign_state(account_id: &str, timestamp: u128, frontend_url: &str, secret: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}|{}", account_id, timestamp, frontend_url);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature).as_bytes()))
}

/// Verify HMAC signature and age, and decode the state parameter.
fn verify_and_decode_state(state: &str, secret: &[u8], now_ms: u128) -> Option<VerifiedState> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    let (payload, signature_hex) = state_str.rsplit_once('|')?;
    let signature = hex::decode(signature_hex).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    if mac.verify_slice(&signature).is_err() {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let mut parts = payload.splitn(3, '|');
    let account_id = parts.next()?;
    let timestamp = u128::from_str_radix(parts.next()?, 16).ok()?;
    let frontend_url = parts.next()?;

    if account_id.is_empty() || now_ms.saturating_sub(timestamp) > STATE_MAX_AGE_MS {
        return None;
    }

    Some(VerifiedState {
        account_id: account_id.to_string(),
        frontend_url: frontend_url.to_string(),
    })
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared calendar API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    CalendarEvent, ConnectionState, EventTime, RemoteCalendar, RemoteEventTime,
    SharedCalendarSetting,
};
use crate::services::{CreatedEvent, NewEvent, SyncResult};
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 4000;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/calendar/status", get(get_status))
        .route("/api/calendar/sync", post(sync_now))
        .route("/api/calendar/events", get(list_events).post(create_event))
        .route("/api/calendar/calendars", get(list_calendars))
        .route(
            "/api/calendar/shared",
            get(get_shared_calendar).put(select_shared_calendar),
        )
}

// ─── Status ──────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub state: ConnectionState,
    pub calendar: SharedCalendarSetting,
    pub is_admin: bool,
}

/// Connection state of the shared calendar. Polled by the frontend after
/// the OAuth redirect completes.
async fn get_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<StatusResponse>> {
    Ok(Json(StatusResponse {
        state: state.sync_service.connection_state().await?,
        calendar: state.sync_service.shared_calendar().await?,
        is_admin: state.config.is_admin(&user.user_id),
    }))
}

// ─── Sync ────────────────────────────────────────────────────

async fn sync_now(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SyncResult>> {
    tracing::info!(user = %user.user_id, "User-initiated calendar sync");
    Ok(Json(
        state
            .sync_service
            .sync_shared_calendar(&user.user_id)
            .await?,
    ))
}

// ─── Events ──────────────────────────────────────────────────

/// The caller's events, earliest first.
async fn list_events(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<CalendarEvent>>> {
    let mut events = state.calendars.list_events(&user.user_id).await?;
    events.sort_by_key(|e| e.start_time.sort_key());
    Ok(Json(events))
}

/// Manual add request. Times use the provider's `{date}` / `{dateTime, timeZone}` shape.
#[derive(Deserialize)]
pub struct CreateEventRequest {
    title: String,
    #[serde(default)]
    description: Option<String>,
    start: RemoteEventTime,
    end: RemoteEventTime,
}

impl CreateEventRequest {
    fn validate(self) -> Result<NewEvent> {
        let title = self.title.trim().to_string();
        if title.is_empty() || title.len() > MAX_TITLE_LEN {
            return Err(AppError::BadRequest(format!(
                "title must be 1-{} characters",
                MAX_TITLE_LEN
            )));
        }

        let description = self.description.filter(|d| !d.trim().is_empty());
        if description
            .as_ref()
            .is_some_and(|d| d.len() > MAX_DESCRIPTION_LEN)
        {
            return Err(AppError::BadRequest(format!(
                "description must be at most {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }

        let start_time = EventTime::from_remote(&self.start)
            .ok_or_else(|| AppError::BadRequest("invalid start".to_string()))?;
        let end_time = EventTime::from_remote(&self.end)
            .ok_or_else(|| AppError::BadRequest("invalid end".to_string()))?;

        if start_time.is_all_day() != end_time.is_all_day() {
            return Err(AppError::BadRequest(
                "start and end must both be dates or both be date-times".to_string(),
            ));
        }
        if end_time.sort_key() < start_time.sort_key() {
            return Err(AppError::BadRequest("end is before start".to_string()));
        }

        Ok(NewEvent {
            title,
            description,
            start_time,
            end_time,
        })
    }
}

/// Create an event on the shared calendar, then sync it back.
async fn create_event(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateEventRequest>,
) -> Result<Json<CreatedEvent>> {
    let event = request.validate()?;
    Ok(Json(
        state
            .sync_service
            .create_event(&user.user_id, event)
            .await?,
    ))
}

// ─── Shared Calendar Selection (admin) ───────────────────────

async fn list_calendars(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<RemoteCalendar>>> {
    user.require_admin(&state.config)?;
    Ok(Json(state.sync_service.list_calendars().await?))
}

async fn get_shared_calendar(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SharedCalendarSetting>> {
    Ok(Json(state.sync_service.shared_calendar().await?))
}

#[derive(Deserialize)]
pub struct SelectCalendarRequest {
    calendar_id: String,
    #[serde(default)]
    calendar_name: Option<String>,
}

/// Switch the shared calendar. Wipes every user's events, then resyncs the caller.
async fn select_shared_calendar(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<SelectCalendarRequest>,
) -> Result<Json<SyncResult>> {
    user.require_admin(&state.config)?;

    let calendar_id = request.calendar_id.trim();
    if calendar_id.is_empty() {
        return Err(AppError::BadRequest("calendar_id is required".to_string()));
    }
    let calendar_name = request
        .calendar_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| calendar_id.to_string());

    tracing::info!(
        user = %user.user_id,
        calendar_id,
        "Administrator selecting shared calendar"
    );

    Ok(Json(
        state
            .sync_service
            .select_calendar(&user.user_id, calendar_id, &calendar_name, &user.user_id)
            .await?,
    ))
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Remote calendar API (Google Calendar v3) on top of the authenticated executor.

use crate::models::calendar::{RemoteCalendarPage, RemoteEventPage};
use crate::models::{NewRemoteEvent, Provider, RemoteCalendar, RemoteEvent};
use crate::services::executor::{ApiRequest, AuthenticatedClient, CallError};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};

/// Events requested per page.
const PAGE_SIZE: u32 = 250;
/// Upper bound on pages followed in one listing.
const MAX_PAGES: usize = 20;

/// Calendar provider resource calls.
#[derive(Clone)]
pub struct CalendarApi {
    client: AuthenticatedClient,
    base_url: String,
}

impl CalendarApi {
    pub fn new(client: AuthenticatedClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        )
    }

    /// Events overlapping `[time_min, time_max)`, recurring events expanded.
    pub async fn list_events(
        &self,
        account_id: &str,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<RemoteEvent>, CallError> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut request = ApiRequest::get(self.events_url(calendar_id))
                .query("timeMin", format_utc_rfc3339(time_min))
                .query("timeMax", format_utc_rfc3339(time_max))
                .query("singleEvents", "true")
                .query("orderBy", "startTime")
                .query("maxResults", PAGE_SIZE.to_string());
            if let Some(token) = page_token.take() {
                request = request.query("pageToken", token);
            }

            let page: RemoteEventPage = self
                .client
                .call_json(account_id, Provider::GoogleCalendar, &request)
                .await?;

            events.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(events),
            }
        }

        tracing::warn!(
            calendar_id,
            fetched = events.len(),
            "Stopped following event pages at limit"
        );
        Ok(events)
    }

    /// Calendars visible to the account.
    pub async fn list_calendars(&self, account_id: &str) -> Result<Vec<RemoteCalendar>, CallError> {
        let url = format!("{}/users/me/calendarList", self.base_url);
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut request = ApiRequest::get(url.clone());
            if let Some(token) = page_token.take() {
                request = request.query("pageToken", token);
            }

            let page: RemoteCalendarPage = self
                .client
                .call_json(account_id, Provider::GoogleCalendar, &request)
                .await?;

            calendars.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(calendars)
    }

    /// Create an event upstream and return it as the provider stored it.
    pub async fn create_event(
        &self,
        account_id: &str,
        calendar_id: &str,
        event: &NewRemoteEvent,
    ) -> Result<RemoteEvent, CallError> {
        let body = serde_json::to_value(event).map_err(|e| CallError::Decode(e.to_string()))?;
        let request = ApiRequest::post_json(self.events_url(calendar_id), body);

        self.client
            .call_json(account_id, Provider::GoogleCalendar, &request)
            .await
    }
}

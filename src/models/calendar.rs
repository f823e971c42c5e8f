// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Calendar models: local event rows, the shared calendar setting, and the
//! remote (Google Calendar v3) wire shapes they are built from.

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::time_utils::{format_date, parse_date};

/// Calendar used when the administrator has not picked one.
pub const PRIMARY_CALENDAR_ID: &str = "primary";

/// Start or end of an event, keeping whether upstream sent a date or an instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventTime {
    /// All-day value (`{date: "YYYY-MM-DD"}` upstream)
    AllDay { date: NaiveDate },
    /// Precise instant with the offset and zone name it was given in
    Timed {
        at: DateTime<FixedOffset>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_zone: Option<String>,
    },
}

impl EventTime {
    /// Parse an upstream time. `dateTime` wins over `date`; unparseable values yield None.
    pub fn from_remote(remote: &RemoteEventTime) -> Option<Self> {
        if let Some(raw) = remote.date_time.as_deref() {
            if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
                return Some(EventTime::Timed {
                    at,
                    time_zone: remote.time_zone.clone(),
                });
            }
        }
        remote
            .date
            .as_deref()
            .and_then(parse_date)
            .map(|date| EventTime::AllDay { date })
    }

    /// Wire representation for event creation.
    pub fn to_remote(&self) -> RemoteEventTime {
        match self {
            EventTime::AllDay { date } => RemoteEventTime {
                date: Some(format_date(*date)),
                date_time: None,
                time_zone: None,
            },
            EventTime::Timed { at, time_zone } => RemoteEventTime {
                date: None,
                date_time: Some(at.to_rfc3339_opts(SecondsFormat::Secs, true)),
                time_zone: time_zone.clone(),
            },
        }
    }

    pub fn is_all_day(&self) -> bool {
        matches!(self, EventTime::AllDay { .. })
    }

    /// UTC instant used for ordering; all-day values sort at midnight UTC.
    pub fn sort_key(&self) -> DateTime<Utc> {
        match self {
            EventTime::AllDay { date } => date.and_time(chrono::NaiveTime::default()).and_utc(),
            EventTime::Timed { at, .. } => at.with_timezone(&Utc),
        }
    }
}

/// Local projection of a remote event, owned by one application user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Local identifier (also used as document ID)
    pub id: String,
    /// Application user who sees this row
    pub owner_id: String,
    /// Provider-assigned ID; None for rows not yet seen upstream
    pub remote_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub start_time: EventTime,
    pub end_time: EventTime,
    /// Derived from title and description at ingestion
    pub is_health_related: bool,
    /// When the row was first inserted (ISO 8601)
    pub created_at: String,
    /// Last reconciliation write (ISO 8601)
    pub updated_at: String,
}

impl CalendarEvent {
    /// Document ID for an (owner, remote_id) pair.
    pub fn key(owner_id: &str, remote_id: &str) -> String {
        format!("{}:{}", owner_id, urlencoding::encode(remote_id))
    }
}

/// Singleton setting naming the calendar every user sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedCalendarSetting {
    pub calendar_id: String,
    pub calendar_name: String,
    /// Administrator who made the change
    pub updated_by: String,
    /// ISO 8601
    pub updated_at: String,
}

// ─── Remote wire types ──────────────────────────────────────────────────────

/// Start/end as sent by the provider. Kept as strings so one bad value
/// does not fail the whole page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

/// Event as listed by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start: Option<RemoteEventTime>,
    #[serde(default)]
    pub end: Option<RemoteEventTime>,
}

/// One page of `GET /calendars/{id}/events`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEventPage {
    #[serde(default)]
    pub items: Vec<RemoteEvent>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Calendar as listed by `GET /users/me/calendarList`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCalendar {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub access_role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCalendarPage {
    #[serde(default)]
    pub items: Vec<RemoteCalendar>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Body of `POST /calendars/{id}/events`.
#[derive(Debug, Clone, Serialize)]
pub struct NewRemoteEvent {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: RemoteEventTime,
    pub end: RemoteEventTime,
}

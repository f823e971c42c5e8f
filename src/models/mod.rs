// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod calendar;
pub mod credential;

pub use calendar::{
    CalendarEvent, EventTime, NewRemoteEvent, RemoteCalendar, RemoteEvent, RemoteEventTime,
    SharedCalendarSetting, PRIMARY_CALENDAR_ID,
};
pub use credential::{ConnectionState, Credential, Provider, TOKEN_REFRESH_MARGIN_SECS};

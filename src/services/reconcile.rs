// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Calendar reconciler.
//!
//! Merges a remote event list into one user's local rows: an upsert keyed on
//! `(owner, remote_id)`. Re-running with unchanged input inserts nothing and
//! leaves every field as it was. Events are independent; one bad event is
//! skipped and the rest of the batch still commits.

use crate::db::CalendarStore;
use crate::models::{CalendarEvent, EventTime, RemoteEvent};
use crate::time_utils::format_utc_rfc3339;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// Case-insensitive terms that mark an event as health-related.
const HEALTH_KEYWORDS: &[&str] = &[
    "doctor",
    "dentist",
    "dental",
    "physician",
    "therapy",
    "therapist",
    "physio",
    "counsel",
    "psychiatr",
    "clinic",
    "hospital",
    "checkup",
    "check-up",
    "medical",
    "medication",
    "prescription",
    "pharmacy",
    "vaccin",
    "blood test",
    "gym",
    "workout",
    "exercise",
    "yoga",
    "pilates",
    "fitness",
    "meditat",
    "wellness",
    "health",
    "nutrition",
    "dietitian",
];

/// Whether title + description mention any health keyword.
pub fn is_health_related(title: &str, description: Option<&str>) -> bool {
    let haystack = format!("{} {}", title, description.unwrap_or_default()).to_lowercase();
    HEALTH_KEYWORDS.iter().any(|k| haystack.contains(k))
}

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub updated: usize,
    /// Malformed upstream events (no usable start or end, or no ID)
    pub skipped: usize,
    /// Events whose storage read or write failed
    pub failed: usize,
}

/// Upserts remote events into local storage.
#[derive(Clone)]
pub struct CalendarReconciler {
    store: Arc<dyn CalendarStore>,
}

impl CalendarReconciler {
    pub fn new(store: Arc<dyn CalendarStore>) -> Self {
        Self { store }
    }

    /// Merge `remote_events` into `owner_id`'s rows.
    pub async fn reconcile(&self, owner_id: &str, remote_events: &[RemoteEvent]) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        for remote in remote_events {
            match self.reconcile_one(owner_id, remote).await {
                Ok(Outcome::Inserted) => summary.inserted += 1,
                Ok(Outcome::Updated) => summary.updated += 1,
                Ok(Outcome::Skipped(reason)) => {
                    tracing::warn!(
                        owner = owner_id,
                        remote_id = %remote.id,
                        reason,
                        "Skipping malformed remote event"
                    );
                    summary.skipped += 1;
                }
                Err(e) => {
                    tracing::error!(
                        owner = owner_id,
                        remote_id = %remote.id,
                        error = %e,
                        "Failed to store remote event"
                    );
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            owner = owner_id,
            inserted = summary.inserted,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            "Reconciliation complete"
        );

        summary
    }

    async fn reconcile_one(
        &self,
        owner_id: &str,
        remote: &RemoteEvent,
    ) -> Result<Outcome, crate::error::AppError> {
        if remote.id.is_empty() {
            return Ok(Outcome::Skipped("missing id"));
        }

        let start = remote.start.as_ref().and_then(EventTime::from_remote);
        let end = remote.end.as_ref().and_then(EventTime::from_remote);

        // A single missing side collapses onto the other.
        let (start_time, end_time) = match (start, end) {
            (Some(s), Some(e)) => (s, e),
            (Some(s), None) => (s.clone(), s),
            (None, Some(e)) => (e.clone(), e),
            (None, None) => return Ok(Outcome::Skipped("missing start and end")),
        };

        let title = remote.summary.clone().unwrap_or_default();
        let description = remote.description.clone().filter(|d| !d.is_empty());
        let health = is_health_related(&title, description.as_deref());
        let now = format_utc_rfc3339(Utc::now());

        let (event, outcome) = match self.store.get_event(owner_id, &remote.id).await? {
            Some(mut existing) => {
                let unchanged = existing.title == title
                    && existing.description == description
                    && existing.start_time == start_time
                    && existing.end_time == end_time
                    && existing.is_health_related == health;
                if unchanged {
                    return Ok(Outcome::Updated);
                }

                existing.title = title;
                existing.description = description;
                existing.start_time = start_time;
                existing.end_time = end_time;
                existing.is_health_related = health;
                existing.updated_at = now;
                (existing, Outcome::Updated)
            }
            None => (
                CalendarEvent {
                    id: CalendarEvent::key(owner_id, &remote.id),
                    owner_id: owner_id.to_string(),
                    remote_id: Some(remote.id.clone()),
                    title,
                    description,
                    start_time,
                    end_time,
                    is_health_related: health,
                    created_at: now.clone(),
                    updated_at: now,
                },
                Outcome::Inserted,
            ),
        };

        self.store.upsert_event(&event).await?;
        Ok(outcome)
    }
}

enum Outcome {
    Inserted,
    Updated,
    Skipped(&'static str),
}

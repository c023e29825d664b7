//! Calendar mirroring contract and the best-effort call boundary.
//!
//! The calendar copy of a task is never authoritative. Every call into a
//! [`CalendarGateway`] goes through [`best_effort`]: bounded by a timeout,
//! failures logged and dropped, and the primary operation's result untouched.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

use crate::task::{Category, Task, TaskChanges};

/// Result of a gateway call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome<T> {
    Synced(T),
    /// No stored credentials for this user. Normal, not an error.
    Unavailable,
}

/// Event fields sent on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorEvent {
    pub task_id: String,
    pub summary: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MirrorEvent {
    pub fn from_task(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            summary: event_summary(task.category, &task.title),
            description: task.description.clone().unwrap_or_default(),
            start: task.scheduled_start,
            end: task.scheduled_end,
        }
    }
}

/// Only the event fields that changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MirrorPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl MirrorPatch {
    /// Build a patch from applied `changes`; `updated` is the task after the change.
    pub fn from_changes(changes: &TaskChanges, updated: &Task) -> Self {
        let summary = (changes.title.is_some() || changes.category.is_some())
            .then(|| event_summary(updated.category, &updated.title));
        Self {
            summary,
            description: changes.description.clone(),
            start: changes.scheduled_start,
            end: changes.scheduled_end,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == MirrorPatch::default()
    }
}

/// `[STUDY] Read chapter 4`
pub fn event_summary(category: Category, title: &str) -> String {
    format!("[{}] {}", category.as_str().to_uppercase(), title)
}

#[async_trait]
pub trait CalendarGateway: Send + Sync {
    /// Create the mirror event; returns the external event id.
    async fn insert(&self, owner_id: &str, event: &MirrorEvent) -> anyhow::Result<MirrorOutcome<String>>;

    async fn patch(
        &self,
        owner_id: &str,
        event_id: &str,
        patch: &MirrorPatch,
    ) -> anyhow::Result<MirrorOutcome<()>>;

    async fn delete(&self, owner_id: &str, event_id: &str) -> anyhow::Result<MirrorOutcome<()>>;
}

/// Gateway for deployments without calendar sync.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCalendar;

#[async_trait]
impl CalendarGateway for NoCalendar {
    async fn insert(&self, _owner_id: &str, _event: &MirrorEvent) -> anyhow::Result<MirrorOutcome<String>> {
        Ok(MirrorOutcome::Unavailable)
    }

    async fn patch(&self, _owner_id: &str, _event_id: &str, _patch: &MirrorPatch) -> anyhow::Result<MirrorOutcome<()>> {
        Ok(MirrorOutcome::Unavailable)
    }

    async fn delete(&self, _owner_id: &str, _event_id: &str) -> anyhow::Result<MirrorOutcome<()>> {
        Ok(MirrorOutcome::Unavailable)
    }
}

/// Run one mirror call. Errors and timeouts are logged and become `None`;
/// nothing here can fail the caller.
pub async fn best_effort<T, Fut>(op: &'static str, task_id: &str, timeout: Duration, call: Fut) -> Option<T>
where
    Fut: Future<Output = anyhow::Result<MirrorOutcome<T>>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(MirrorOutcome::Synced(v))) => {
            tracing::debug!(op, task_id, "calendar mirror synced");
            Some(v)
        }
        Ok(Ok(MirrorOutcome::Unavailable)) => {
            tracing::debug!(op, task_id, "calendar mirror unavailable, skipping");
            None
        }
        Ok(Err(e)) => {
            tracing::warn!(op, task_id, error = %format!("{e:#}"), "calendar mirror failed");
            None
        }
        Err(_) => {
            tracing::warn!(op, task_id, timeout_ms = timeout.as_millis() as u64, "calendar mirror timed out");
            None
        }
    }
}

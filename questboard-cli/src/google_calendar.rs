use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use questboard_core::{CalendarGateway, MirrorEvent, MirrorOutcome, MirrorPatch};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::auth::load_secrets;

/// Tag stored on every mirrored event so it can be traced back to its task.
const APP_TAG: &str = "questboard";

/// Google Calendar v3 over plain REST, authorized with the access token
/// captured for each user at sign-in.
#[derive(Debug, Clone)]
pub struct GoogleCalendar {
    http: reqwest::Client,
    base_url: String,
    calendar_id: String,
    secrets_path: PathBuf,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct EventDateTime {
    date_time: String,
    time_zone: &'static str,
}

impl EventDateTime {
    fn utc(dt: DateTime<Utc>) -> Self {
        Self {
            date_time: dt.to_rfc3339(),
            time_zone: "UTC",
        }
    }
}

#[derive(Debug, Serialize)]
struct PrivateProperties<'a> {
    app: &'static str,
    #[serde(rename = "taskId")]
    task_id: &'a str,
}

#[derive(Debug, Serialize)]
struct ExtendedProperties<'a> {
    private: PrivateProperties<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertBody<'a> {
    summary: &'a str,
    description: &'a str,
    start: EventDateTime,
    end: EventDateTime,
    extended_properties: ExtendedProperties<'a>,
}

#[derive(Debug, Default, Serialize, PartialEq)]
struct PatchBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start: Option<EventDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end: Option<EventDateTime>,
}

#[derive(Debug, Deserialize)]
struct InsertedEvent {
    id: Option<String>,
}

fn insert_body(event: &MirrorEvent) -> InsertBody<'_> {
    InsertBody {
        summary: &event.summary,
        description: &event.description,
        start: EventDateTime::utc(event.start),
        end: EventDateTime::utc(event.end),
        extended_properties: ExtendedProperties {
            private: PrivateProperties {
                app: APP_TAG,
                task_id: &event.task_id,
            },
        },
    }
}

fn patch_body(patch: &MirrorPatch) -> PatchBody<'_> {
    PatchBody {
        summary: patch.summary.as_deref(),
        description: patch.description.as_deref(),
        start: patch.start.map(EventDateTime::utc),
        end: patch.end.map(EventDateTime::utc),
    }
}

impl GoogleCalendar {
    pub fn new(
        base_url: impl Into<String>,
        calendar_id: impl Into<String>,
        secrets_path: PathBuf,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            calendar_id: calendar_id.into(),
            secrets_path,
        }
    }

    /// Stored access token for `user_id`, read fresh on each call.
    fn access_token(&self, user_id: &str) -> Result<Option<String>> {
        let secrets = load_secrets(&self.secrets_path)?;
        Ok(secrets
            .users
            .get(user_id)
            .map(|c| c.access_token.clone())
            .filter(|t| !t.is_empty()))
    }

    /// `{base}/calendars/{calendar_id}/events[/{event_id}]`
    fn events_url(&self, event_id: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid calendar base_url {}", self.base_url))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow::anyhow!("calendar base_url cannot be a base"))?;
            segments.pop_if_empty().push("calendars").push(&self.calendar_id).push("events");
            if let Some(id) = event_id {
                segments.push(id);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl CalendarGateway for GoogleCalendar {
    async fn insert(&self, owner_id: &str, event: &MirrorEvent) -> Result<MirrorOutcome<String>> {
        let Some(token) = self.access_token(owner_id)? else {
            return Ok(MirrorOutcome::Unavailable);
        };

        let resp = self
            .http
            .post(self.events_url(None)?)
            .bearer_auth(token)
            .json(&insert_body(event))
            .send()
            .await
            .with_context(|| format!("inserting event '{}'", event.summary))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("calendar insert failed: {status} {body}");
        }

        let inserted: InsertedEvent = resp.json().await.context("parse inserted event")?;
        match inserted.id {
            Some(id) => Ok(MirrorOutcome::Synced(id)),
            None => bail!("calendar insert returned no event id"),
        }
    }

    async fn patch(
        &self,
        owner_id: &str,
        event_id: &str,
        patch: &MirrorPatch,
    ) -> Result<MirrorOutcome<()>> {
        let Some(token) = self.access_token(owner_id)? else {
            return Ok(MirrorOutcome::Unavailable);
        };

        let resp = self
            .http
            .patch(self.events_url(Some(event_id))?)
            .bearer_auth(token)
            .json(&patch_body(patch))
            .send()
            .await
            .with_context(|| format!("patching event {event_id}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("calendar patch failed: {status} {body}");
        }
        Ok(MirrorOutcome::Synced(()))
    }

    async fn delete(&self, owner_id: &str, event_id: &str) -> Result<MirrorOutcome<()>> {
        let Some(token) = self.access_token(owner_id)? else {
            return Ok(MirrorOutcome::Unavailable);
        };

        let resp = self
            .http
            .delete(self.events_url(Some(event_id))?)
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("deleting event {event_id}"))?;

        match resp.status() {
            s if s.is_success() => Ok(MirrorOutcome::Synced(())),
            // Already gone on the calendar side.
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(MirrorOutcome::Synced(())),
            s => bail!("calendar delete failed: {s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store_calendar_credentials;
    use chrono::TimeZone;

    fn calendar(dir: &std::path::Path) -> GoogleCalendar {
        GoogleCalendar::new(
            "https://www.googleapis.com/calendar/v3",
            "team@group.calendar.google.com",
            dir.join("secrets.json"),
        )
    }

    #[test]
    fn events_url_appends_calendar_and_event_segments() {
        let dir = tempfile::tempdir().unwrap();
        let url = calendar(dir.path()).events_url(Some("evt1")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/team@group.calendar.google.com/events/evt1"
        );
    }

    #[test]
    fn insert_body_tags_event_with_task_id() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let event = MirrorEvent {
            task_id: "t1".to_string(),
            summary: "[GYM] Squats".to_string(),
            description: String::new(),
            start,
            end: start + chrono::Duration::hours(1),
        };
        let json = serde_json::to_value(insert_body(&event)).unwrap();
        assert_eq!(json["extendedProperties"]["private"]["taskId"], "t1");
        assert_eq!(json["extendedProperties"]["private"]["app"], "questboard");
        assert_eq!(json["start"]["dateTime"], "2026-03-02T09:00:00+00:00");
    }

    #[test]
    fn patch_body_omits_unchanged_fields() {
        let patch = MirrorPatch {
            description: Some("new notes".to_string()),
            ..MirrorPatch::default()
        };
        let json = serde_json::to_value(patch_body(&patch)).unwrap();
        assert_eq!(json, serde_json::json!({ "description": "new notes" }));
    }

    #[tokio::test]
    async fn missing_credentials_are_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let cal = calendar(dir.path());
        let out = cal.delete("nobody", "evt1").await.unwrap();
        assert_eq!(out, MirrorOutcome::Unavailable);

        store_calendar_credentials(&dir.path().join("secrets.json"), "u1", "ya29.token", None).unwrap();
        assert_eq!(cal.access_token("u1").unwrap().as_deref(), Some("ya29.token"));
    }
}

use anyhow::Result;
use async_trait::async_trait;
use questboard_core::{CalendarGateway, MirrorEvent, MirrorOutcome, MirrorPatch, NoCalendar};
use std::path::PathBuf;

use crate::config::CalendarSection;
use crate::google_calendar::GoogleCalendar;

/// Calendar mirror selected by `[calendar].enabled`.
#[derive(Debug, Clone)]
pub enum CalendarBackend {
    Google(GoogleCalendar),
    Disabled(NoCalendar),
}

impl CalendarBackend {
    pub fn from_config(section: &CalendarSection, secrets_path: PathBuf) -> Self {
        if section.enabled {
            CalendarBackend::Google(GoogleCalendar::new(
                section.base_url.clone(),
                section.calendar_id.clone(),
                secrets_path,
            ))
        } else {
            CalendarBackend::Disabled(NoCalendar)
        }
    }
}

#[async_trait]
impl CalendarGateway for CalendarBackend {
    async fn insert(&self, owner_id: &str, event: &MirrorEvent) -> Result<MirrorOutcome<String>> {
        match self {
            CalendarBackend::Google(g) => g.insert(owner_id, event).await,
            CalendarBackend::Disabled(n) => n.insert(owner_id, event).await,
        }
    }

    async fn patch(
        &self,
        owner_id: &str,
        event_id: &str,
        patch: &MirrorPatch,
    ) -> Result<MirrorOutcome<()>> {
        match self {
            CalendarBackend::Google(g) => g.patch(owner_id, event_id, patch).await,
            CalendarBackend::Disabled(n) => n.patch(owner_id, event_id, patch).await,
        }
    }

    async fn delete(&self, owner_id: &str, event_id: &str) -> Result<MirrorOutcome<()>> {
        match self {
            CalendarBackend::Google(g) => g.delete(owner_id, event_id).await,
            CalendarBackend::Disabled(n) => n.delete(owner_id, event_id).await,
        }
    }
}

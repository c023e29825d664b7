//! Planner: the request-facing service.
//!
//! Ties a document store and a calendar gateway together. Task lifecycle and
//! completion live in `crate::lifecycle` and `crate::completion`; this module
//! holds construction plus the profile operations and read path.
//!
//! Every operation takes the verified [`Caller`] explicitly and re-reads
//! current state; nothing is cached between calls.

use chrono::Utc;
use chrono_tz::Tz;
use std::time::Duration;

use crate::error::{QuestError, Result};
use crate::identity::{Caller, VerifiedIdentity};
use crate::mirror::CalendarGateway;
use crate::profile::{Mode, UserProfile};
use crate::store::DocumentStore;
use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannerConfig {
    /// Zone for local `YYYY-MM-DD HH:MM` schedule input.
    pub timezone: Tz,
    /// Upper bound on any single calendar call.
    pub calendar_timeout: Duration,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            calendar_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Planner<S: DocumentStore, C: CalendarGateway> {
    pub(crate) store: S,
    pub(crate) calendar: C,
    pub(crate) config: PlannerConfig,
}

impl<S: DocumentStore, C: CalendarGateway> Planner<S, C> {
    pub fn new(store: S, calendar: C) -> Self {
        Self::with_config(store, calendar, PlannerConfig::default())
    }

    pub fn with_config(store: S, calendar: C, config: PlannerConfig) -> Self {
        Self {
            store,
            calendar,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn calendar(&self) -> &C {
        &self.calendar
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Provision the caller's profile on first sign-in; later calls are no-ops.
    ///
    /// Returns the stored profile and whether this call created it.
    pub async fn sync_profile(
        &self,
        caller: &Caller,
        identity: &VerifiedIdentity,
    ) -> Result<(UserProfile, bool)> {
        let fresh = UserProfile::new(caller.id(), Utc::now())
            .with_display_name(identity.name.clone().unwrap_or_default())
            .with_email(identity.email.clone().unwrap_or_default());

        let (profile, created) = self.store.create_profile_if_absent(fresh).await?;
        if created {
            tracing::info!(user = caller.id(), "created profile");
        }
        Ok((profile, created))
    }

    pub async fn profile(&self, caller: &Caller) -> Result<UserProfile> {
        self.store
            .get_profile(caller.id())
            .await?
            .ok_or(QuestError::NotFound("profile"))
    }

    /// Change the XP preset. Only completions after this call are affected.
    pub async fn switch_mode(&self, caller: &Caller, mode: Mode) -> Result<UserProfile> {
        let profile = self
            .store
            .set_mode(caller.id(), mode, Utc::now())
            .await?
            .ok_or(QuestError::NotFound("profile"))?;
        tracing::info!(user = caller.id(), %mode, "switched mode");
        Ok(profile)
    }

    /// The caller's pending missions, earliest first.
    pub async fn pending_tasks(&self, caller: &Caller) -> Result<Vec<Task>> {
        Ok(self.store.pending_tasks(caller.id()).await?)
    }

    /// Load a task and check the caller owns it.
    pub(crate) async fn owned_task(&self, caller: &Caller, task_id: &str) -> Result<Option<Task>> {
        match self.store.get_task(task_id).await? {
            Some(task) if task.owner_id != caller.id() => Err(QuestError::Forbidden),
            other => Ok(other),
        }
    }
}

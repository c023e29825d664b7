//! Task lifecycle: create, update, delete.
//!
//! Each touches one task record. Calendar mirroring runs after the record is
//! written, through `mirror::best_effort`, so mirror failures never change
//! the outcome and never roll anything back.

use chrono::Utc;
use uuid::Uuid;

use crate::error::{QuestError, Result};
use crate::identity::Caller;
use crate::mirror::{best_effort, CalendarGateway, MirrorEvent, MirrorPatch};
use crate::planner::Planner;
use crate::store::{DocumentStore, TaskUpdate};
use crate::task::{validate_new, validate_update, Task, TaskChanges, TaskInput, TaskStatus};

impl<S: DocumentStore, C: CalendarGateway> Planner<S, C> {
    /// Validate and persist a new pending task, then mirror it.
    ///
    /// `xp_reward` always comes from the difficulty table.
    pub async fn create_task(&self, caller: &Caller, input: &TaskInput) -> Result<Task> {
        let new = validate_new(input, self.config.timezone)?;
        let now = Utc::now();

        let mut task = Task::new(
            Uuid::new_v4().to_string(),
            caller.id(),
            new.title,
            new.category,
            new.difficulty,
            now,
        )
        .with_schedule(new.scheduled_start, new.scheduled_end);
        task.description = new.description;

        self.store.insert_task(task.clone()).await?;
        tracing::info!(user = caller.id(), task_id = %task.id, xp_reward = task.xp_reward, "created task");

        let event = MirrorEvent::from_task(&task);
        let mirrored = best_effort(
            "insert",
            &task.id,
            self.config.calendar_timeout,
            self.calendar.insert(caller.id(), &event),
        )
        .await;

        if let Some(event_id) = mirrored {
            match self.store.set_calendar_ref(&task.id, Some(event_id.clone())).await {
                Ok(true) => task.external_calendar_ref = Some(event_id),
                Ok(false) => tracing::warn!(
                    task_id = %task.id,
                    event_id = %event_id,
                    "task removed before calendar ref was stored, mirror event orphaned"
                ),
                // The event exists but the link was not saved; the task stays unlinked.
                Err(e) => tracing::warn!(task_id = %task.id, error = %e, "failed to store calendar ref"),
            }
        }

        Ok(task)
    }

    /// Apply a partial update to a pending task the caller owns.
    ///
    /// Returns the fields that were changed.
    pub async fn update_task(
        &self,
        caller: &Caller,
        task_id: &str,
        input: &TaskInput,
    ) -> Result<TaskChanges> {
        let current = self
            .owned_task(caller, task_id)
            .await?
            .ok_or(QuestError::NotFound("task"))?;
        if current.status != TaskStatus::Pending {
            return Err(QuestError::Conflict(format!(
                "task {task_id} is no longer pending"
            )));
        }

        let changes = validate_update(input, &current, self.config.timezone)?;
        if changes == TaskChanges::default() {
            return Ok(changes);
        }

        // Ownership and status are checked again at write time; a completion
        // may have committed since `current` was read.
        let updated = match self.store.update_task(task_id, caller.id(), &changes).await? {
            TaskUpdate::Applied(task) => task,
            TaskUpdate::Missing => return Err(QuestError::NotFound("task")),
            TaskUpdate::NotOwner => return Err(QuestError::Forbidden),
            TaskUpdate::NotPending(_) => {
                return Err(QuestError::Conflict(format!(
                    "task {task_id} is no longer pending"
                )));
            }
        };
        tracing::info!(user = caller.id(), task_id, "updated task");

        if let Some(event_id) = &current.external_calendar_ref {
            let patch = MirrorPatch::from_changes(&changes, &updated);
            if !patch.is_empty() {
                best_effort(
                    "patch",
                    task_id,
                    self.config.calendar_timeout,
                    self.calendar.patch(caller.id(), event_id, &patch),
                )
                .await;
            }
        }

        Ok(changes)
    }

    /// Hard-delete a task. Deleting an absent task succeeds.
    pub async fn delete_task(&self, caller: &Caller, task_id: &str) -> Result<()> {
        let Some(current) = self.owned_task(caller, task_id).await? else {
            tracing::debug!(user = caller.id(), task_id, "delete of absent task");
            return Ok(());
        };

        self.store.delete_task(task_id).await?;
        tracing::info!(user = caller.id(), task_id, "deleted task");

        if let Some(event_id) = &current.external_calendar_ref {
            best_effort(
                "delete",
                task_id,
                self.config.calendar_timeout,
                self.calendar.delete(caller.id(), event_id),
            )
            .await;
        }

        Ok(())
    }
}

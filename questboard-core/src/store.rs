//! Document store contract.
//!
//! Keyed task and profile records, one owner query, and a transaction
//! primitive that reads a task and a profile and conditionally writes both
//! back under serializable isolation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::{Result, StoreError};
use crate::profile::{Mode, UserProfile};
use crate::task::{Task, TaskChanges, TaskStatus};

/// The two records visible to a transaction body.
///
/// Mutations made here are committed only if the body returns `Ok`.
#[derive(Debug, Clone, PartialEq)]
pub struct TxnRecords {
    pub task: Option<Task>,
    pub profile: Option<UserProfile>,
}

/// Result of a guarded task update.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskUpdate {
    Applied(Task),
    Missing,
    NotOwner,
    /// The task left `Pending` before the write; nothing was changed.
    NotPending(TaskStatus),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_task(&self, id: &str) -> std::result::Result<Option<Task>, StoreError>;

    /// Pending tasks owned by `owner_id`, ordered by `scheduled_start`.
    async fn pending_tasks(&self, owner_id: &str) -> std::result::Result<Vec<Task>, StoreError>;

    async fn insert_task(&self, task: Task) -> std::result::Result<(), StoreError>;

    /// Field-level update, applied only while the task is still pending and
    /// owned by `owner_id`. Both checks run atomically with the write.
    async fn update_task(
        &self,
        id: &str,
        owner_id: &str,
        changes: &TaskChanges,
    ) -> std::result::Result<TaskUpdate, StoreError>;

    /// Returns false when the task no longer exists.
    async fn set_calendar_ref(
        &self,
        id: &str,
        event_id: Option<String>,
    ) -> std::result::Result<bool, StoreError>;

    /// Hard delete. Returns the removed record, if any.
    async fn delete_task(&self, id: &str) -> std::result::Result<Option<Task>, StoreError>;

    async fn get_profile(&self, id: &str) -> std::result::Result<Option<UserProfile>, StoreError>;

    /// Insert `profile` unless one already exists for its id.
    ///
    /// Returns the stored profile and whether it was created.
    async fn create_profile_if_absent(
        &self,
        profile: UserProfile,
    ) -> std::result::Result<(UserProfile, bool), StoreError>;

    /// Returns the updated profile, or `None` if absent.
    async fn set_mode(
        &self,
        id: &str,
        mode: Mode,
        now: DateTime<Utc>,
    ) -> std::result::Result<Option<UserProfile>, StoreError>;

    /// Run `body` against the current task and profile records atomically.
    ///
    /// No other writer may observe or change either record between the read
    /// and the write. Body errors abort without writing; contention is
    /// reported as `StoreError::Contention`.
    async fn transact<T, F>(&self, task_id: &str, profile_id: &str, body: F) -> Result<T>
    where
        F: FnOnce(&mut TxnRecords) -> Result<T> + Send,
        T: Send;
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for Arc<S> {
    async fn get_task(&self, id: &str) -> std::result::Result<Option<Task>, StoreError> {
        (**self).get_task(id).await
    }

    async fn pending_tasks(&self, owner_id: &str) -> std::result::Result<Vec<Task>, StoreError> {
        (**self).pending_tasks(owner_id).await
    }

    async fn insert_task(&self, task: Task) -> std::result::Result<(), StoreError> {
        (**self).insert_task(task).await
    }

    async fn update_task(
        &self,
        id: &str,
        owner_id: &str,
        changes: &TaskChanges,
    ) -> std::result::Result<TaskUpdate, StoreError> {
        (**self).update_task(id, owner_id, changes).await
    }

    async fn set_calendar_ref(
        &self,
        id: &str,
        event_id: Option<String>,
    ) -> std::result::Result<bool, StoreError> {
        (**self).set_calendar_ref(id, event_id).await
    }

    async fn delete_task(&self, id: &str) -> std::result::Result<Option<Task>, StoreError> {
        (**self).delete_task(id).await
    }

    async fn get_profile(&self, id: &str) -> std::result::Result<Option<UserProfile>, StoreError> {
        (**self).get_profile(id).await
    }

    async fn create_profile_if_absent(
        &self,
        profile: UserProfile,
    ) -> std::result::Result<(UserProfile, bool), StoreError> {
        (**self).create_profile_if_absent(profile).await
    }

    async fn set_mode(
        &self,
        id: &str,
        mode: Mode,
        now: DateTime<Utc>,
    ) -> std::result::Result<Option<UserProfile>, StoreError> {
        (**self).set_mode(id, mode, now).await
    }

    async fn transact<T, F>(&self, task_id: &str, profile_id: &str, body: F) -> Result<T>
    where
        F: FnOnce(&mut TxnRecords) -> Result<T> + Send,
        T: Send,
    {
        (**self).transact(task_id, profile_id, body).await
    }
}

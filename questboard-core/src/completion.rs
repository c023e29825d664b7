//! Task completion: the one cross-record transaction.
//!
//! Preconditions are checked against the records read inside the store
//! transaction, never against an earlier read, so a racing or retried
//! completion always sees the committed status and is rejected.

use chrono::Utc;
use serde::Serialize;

use crate::error::{QuestError, Result, StoreError};
use crate::identity::Caller;
use crate::mirror::CalendarGateway;
use crate::planner::Planner;
use crate::profile::Stats;
use crate::progression::{compute_task_xp, decide_level_up, update_stats};
use crate::store::{DocumentStore, TxnRecords};
use crate::task::TaskStatus;

/// What a completion granted. Informational; the stored profile is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompletionReward {
    pub gained_xp: u64,
    pub new_level: u32,
    pub leveled_up: bool,
    pub new_stats: Stats,
}

impl<S: DocumentStore, C: CalendarGateway> Planner<S, C> {
    /// Mark a pending task completed and grant its rewards, atomically.
    pub async fn complete_task(&self, caller: &Caller, task_id: &str) -> Result<CompletionReward> {
        let uid = caller.id();
        let outcome = self
            .store
            .transact(task_id, uid, |records| apply_completion(records, uid))
            .await;

        match outcome {
            Ok(reward) => {
                tracing::info!(
                    user = uid,
                    task_id,
                    gained_xp = reward.gained_xp,
                    level = reward.new_level,
                    leveled_up = reward.leveled_up,
                    "completed task"
                );
                Ok(reward)
            }
            Err(QuestError::Store(StoreError::Contention(what))) => {
                Err(QuestError::Conflict(format!("concurrent update on {what}, retry")))
            }
            Err(e) => Err(e),
        }
    }
}

/// Transaction body: validate, compute, and write both records in place.
fn apply_completion(records: &mut TxnRecords, uid: &str) -> Result<CompletionReward> {
    let TxnRecords { task, profile } = records;
    let task = task.as_mut().ok_or(QuestError::NotFound("task"))?;
    let profile = profile.as_mut().ok_or(QuestError::NotFound("profile"))?;

    if task.owner_id != uid {
        return Err(QuestError::Forbidden);
    }
    match task.status {
        TaskStatus::Pending => {}
        TaskStatus::Completed => {
            return Err(QuestError::Conflict("task already completed".to_string()));
        }
        TaskStatus::Failed => {
            return Err(QuestError::Conflict("task has failed".to_string()));
        }
    }

    let gained_xp = compute_task_xp(task, profile.mode);
    let new_stats = update_stats(profile.stats.as_ref(), task.category);
    let level = decide_level_up(
        profile.current_xp,
        gained_xp,
        profile.level,
        profile.next_level_xp,
    );

    let now = Utc::now();
    task.status = TaskStatus::Completed;
    task.completed_at = Some(now);

    profile.current_xp = level.new_xp;
    profile.level = level.new_level;
    profile.next_level_xp = level.next_level_xp;
    profile.stats = Some(new_stats);
    profile.updated_at = now;

    Ok(CompletionReward {
        gained_xp,
        new_level: level.new_level,
        leveled_up: level.leveled_up,
        new_stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::UserProfile;
    use crate::task::{Category, Difficulty, Task};

    fn records(owner: &str, status: TaskStatus) -> TxnRecords {
        let now = Utc::now();
        let mut task = Task::new("t1", owner, "Leg day", Category::Gym, Difficulty::Medium, now);
        task.status = status;
        TxnRecords {
            task: Some(task),
            profile: Some(UserProfile::new("u1", now)),
        }
    }

    #[test]
    fn body_updates_both_records() {
        let mut r = records("u1", TaskStatus::Pending);
        let reward = apply_completion(&mut r, "u1").unwrap();

        assert_eq!(reward.gained_xp, 20);
        assert_eq!(reward.new_stats.strength, 1);
        assert!(!reward.leveled_up);

        let task = r.task.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.completed_at.is_some());
        let profile = r.profile.unwrap();
        assert_eq!(profile.current_xp, 20);
        assert_eq!(profile.stats().strength, 1);
    }

    #[test]
    fn precondition_failures_are_distinct() {
        let mut missing_task = records("u1", TaskStatus::Pending);
        missing_task.task = None;
        assert!(matches!(
            apply_completion(&mut missing_task, "u1"),
            Err(QuestError::NotFound("task"))
        ));

        let mut missing_profile = records("u1", TaskStatus::Pending);
        missing_profile.profile = None;
        assert!(matches!(
            apply_completion(&mut missing_profile, "u1"),
            Err(QuestError::NotFound("profile"))
        ));

        let mut foreign = records("u2", TaskStatus::Pending);
        assert!(matches!(apply_completion(&mut foreign, "u1"), Err(QuestError::Forbidden)));

        let mut done = records("u1", TaskStatus::Completed);
        assert!(matches!(apply_completion(&mut done, "u1"), Err(QuestError::Conflict(_))));

        let mut failed = records("u1", TaskStatus::Failed);
        assert!(matches!(apply_completion(&mut failed, "u1"), Err(QuestError::Conflict(_))));
    }
}

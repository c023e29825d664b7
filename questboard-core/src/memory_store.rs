//! In-process document store, optionally persisted to a JSON file.
//!
//! All records live behind one mutex, so every call (and in particular every
//! transaction) is serializable. With a backing file, each mutation is first
//! applied to a copy, written to disk, and only then made visible.
//!
//! Meant for a single CLI process: file writes happen synchronously while the
//! lock is held, and nothing coordinates with other processes sharing the file.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{Result, StoreError};
use crate::profile::{Mode, UserProfile};
use crate::store::{DocumentStore, TaskUpdate, TxnRecords};
use crate::task::{Task, TaskChanges, TaskStatus};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    tasks: BTreeMap<String, Task>,
    #[serde(default)]
    profiles: BTreeMap<String, UserProfile>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<StoreData>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path` (empty if the file does not exist yet) and persist
    /// every later mutation back to it.
    pub fn open(path: impl Into<PathBuf>) -> std::result::Result<Self, StoreError> {
        let path = path.into();
        let data = if path.exists() {
            let s = fs::read_to_string(&path)?;
            serde_json::from_str(&s)?
        } else {
            StoreData::default()
        };
        Ok(Self {
            data: Mutex::new(data),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> std::result::Result<MutexGuard<'_, StoreData>, StoreError> {
        self.data.lock().map_err(|_| StoreError::Poisoned)
    }

    fn read<R>(&self, f: impl FnOnce(&StoreData) -> R) -> std::result::Result<R, StoreError> {
        let guard = self.lock()?;
        Ok(f(&guard))
    }

    /// Apply `f` to a copy; persist and publish the copy only on success.
    fn mutate<R, E>(&self, f: impl FnOnce(&mut StoreData) -> std::result::Result<R, E>) -> std::result::Result<R, E>
    where
        E: From<StoreError>,
    {
        let mut guard = self.lock()?;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(out)
    }

    fn persist(&self, data: &StoreData) -> std::result::Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(data)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_task(&self, id: &str) -> std::result::Result<Option<Task>, StoreError> {
        self.read(|d| d.tasks.get(id).cloned())
    }

    async fn pending_tasks(&self, owner_id: &str) -> std::result::Result<Vec<Task>, StoreError> {
        self.read(|d| {
            let mut out: Vec<Task> = d
                .tasks
                .values()
                .filter(|t| t.owner_id == owner_id && t.status == TaskStatus::Pending)
                .cloned()
                .collect();
            out.sort_by(|a, b| {
                a.scheduled_start
                    .cmp(&b.scheduled_start)
                    .then_with(|| a.id.cmp(&b.id))
            });
            out
        })
    }

    async fn insert_task(&self, task: Task) -> std::result::Result<(), StoreError> {
        self.mutate(|d| {
            d.tasks.insert(task.id.clone(), task);
            Ok::<_, StoreError>(())
        })
    }

    async fn update_task(
        &self,
        id: &str,
        owner_id: &str,
        changes: &TaskChanges,
    ) -> std::result::Result<TaskUpdate, StoreError> {
        self.mutate(|d| {
            let outcome = match d.tasks.get_mut(id) {
                None => TaskUpdate::Missing,
                Some(t) if t.owner_id != owner_id => TaskUpdate::NotOwner,
                Some(t) if t.status != TaskStatus::Pending => TaskUpdate::NotPending(t.status),
                Some(t) => {
                    t.apply(changes);
                    TaskUpdate::Applied(t.clone())
                }
            };
            Ok::<_, StoreError>(outcome)
        })
    }

    async fn set_calendar_ref(
        &self,
        id: &str,
        event_id: Option<String>,
    ) -> std::result::Result<bool, StoreError> {
        self.mutate(|d| {
            Ok::<_, StoreError>(match d.tasks.get_mut(id) {
                Some(t) => {
                    t.external_calendar_ref = event_id;
                    true
                }
                None => false,
            })
        })
    }

    async fn delete_task(&self, id: &str) -> std::result::Result<Option<Task>, StoreError> {
        self.mutate(|d| Ok::<_, StoreError>(d.tasks.remove(id)))
    }

    async fn get_profile(&self, id: &str) -> std::result::Result<Option<UserProfile>, StoreError> {
        self.read(|d| d.profiles.get(id).cloned())
    }

    async fn create_profile_if_absent(
        &self,
        profile: UserProfile,
    ) -> std::result::Result<(UserProfile, bool), StoreError> {
        if let Some(existing) = self.read(|d| d.profiles.get(&profile.id).cloned())? {
            return Ok((existing, false));
        }
        self.mutate(|d| {
            Ok::<_, StoreError>(match d.profiles.get(&profile.id) {
                Some(existing) => (existing.clone(), false),
                None => {
                    d.profiles.insert(profile.id.clone(), profile.clone());
                    (profile, true)
                }
            })
        })
    }

    async fn set_mode(
        &self,
        id: &str,
        mode: Mode,
        now: DateTime<Utc>,
    ) -> std::result::Result<Option<UserProfile>, StoreError> {
        self.mutate(|d| {
            Ok::<_, StoreError>(d.profiles.get_mut(id).map(|p| {
                p.mode = mode;
                p.updated_at = now;
                p.clone()
            }))
        })
    }

    async fn transact<T, F>(&self, task_id: &str, profile_id: &str, body: F) -> Result<T>
    where
        F: FnOnce(&mut TxnRecords) -> Result<T> + Send,
        T: Send,
    {
        self.mutate(|d| {
            let mut records = TxnRecords {
                task: d.tasks.get(task_id).cloned(),
                profile: d.profiles.get(profile_id).cloned(),
            };
            let out = body(&mut records)?;
            if let Some(task) = records.task {
                d.tasks.insert(task_id.to_string(), task);
            }
            if let Some(profile) = records.profile {
                d.profiles.insert(profile_id.to_string(), profile);
            }
            Ok(out)
        })
    }
}

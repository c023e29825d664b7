//! Mission (task) model and the one validation path shared by create and update.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{FieldError, QuestError, Result};
use crate::profile::Stat;
use crate::time::parse_timestamp;

pub const MAX_TITLE_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    /// Reserved for missed deadlines; nothing transitions here yet.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Study,
    Gym,
    Work,
    Life,
    Health,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Study,
        Category::Gym,
        Category::Work,
        Category::Life,
        Category::Health,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Study => "study",
            Category::Gym => "gym",
            Category::Work => "work",
            Category::Life => "life",
            Category::Health => "health",
        }
    }

    /// The stat a completed task of this category grows.
    ///
    /// Single source for both the display metadata and completion rewards.
    pub fn stat(self) -> Stat {
        match self {
            Category::Study => Stat::Intelligence,
            Category::Gym | Category::Health => Stat::Strength,
            Category::Work => Stat::Discipline,
            Category::Life => Stat::Balance,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category '{s}' (expected study, gym, work, life or health)"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Base XP, fixed at creation.
    pub fn base_xp(self) -> u32 {
        match self {
            Difficulty::Easy => 10,
            Difficulty::Medium => 20,
            Difficulty::Hard => 40,
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Difficulty::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| format!("unknown difficulty '{s}' (expected easy, medium or hard)"))
    }
}

/// Stat growth shown alongside a task. Completion recomputes from `category`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatReward {
    pub stat: Stat,
    pub amount: u32,
}

impl From<Category> for StatReward {
    fn from(category: Category) -> Self {
        Self {
            stat: category.stat(),
            amount: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,

    pub category: Category,
    pub difficulty: Difficulty,
    pub status: TaskStatus,

    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,

    /// Set from `difficulty` at creation; never recomputed.
    pub xp_reward: u32,
    pub stat_reward: StatReward,

    /// Calendar event id of the mirror, when mirroring succeeded.
    #[serde(default)]
    pub external_calendar_ref: Option<String>,

    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        title: impl Into<String>,
        category: Category,
        difficulty: Difficulty,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            title: title.into(),
            description: None,
            category,
            difficulty,
            status: TaskStatus::Pending,
            scheduled_start: now,
            scheduled_end: now,
            xp_reward: difficulty.base_xp(),
            stat_reward: category.into(),
            external_calendar_ref: None,
            created_at: now,
            completed_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_schedule(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.scheduled_start = start;
        self.scheduled_end = end;
        self
    }

    /// Apply validated field changes. Category changes refresh `stat_reward`.
    pub fn apply(&mut self, changes: &TaskChanges) {
        if let Some(title) = &changes.title {
            self.title = title.clone();
        }
        if let Some(description) = &changes.description {
            self.description = (!description.is_empty()).then(|| description.clone());
        }
        if let Some(category) = changes.category {
            self.category = category;
            self.stat_reward = category.into();
        }
        if let Some(start) = changes.scheduled_start {
            self.scheduled_start = start;
        }
        if let Some(end) = changes.scheduled_end {
            self.scheduled_end = end;
        }
    }
}

/// Raw task fields as submitted by a caller. Every field is optional so the
/// same shape serves create (all required fields present) and partial update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub scheduled_start: Option<String>,
    pub scheduled_end: Option<String>,
}

impl TaskInput {
    pub fn is_empty(&self) -> bool {
        *self == TaskInput::default()
    }
}

/// Typed, validated subset of task fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_end: Option<DateTime<Utc>>,
}

/// Fully validated fields for a new task.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    pub difficulty: Difficulty,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
}

/// Validate whichever fields are present, collecting every field error.
pub fn validate_fields(input: &TaskInput, tz: Tz) -> Result<TaskChanges> {
    let mut errors = Vec::new();
    let mut changes = TaskChanges::default();

    if let Some(title) = &input.title {
        if title.trim().is_empty() {
            errors.push(FieldError::new("title", "Title is required"));
        } else if title.chars().count() > MAX_TITLE_CHARS {
            errors.push(FieldError::new(
                "title",
                format!("must be at most {MAX_TITLE_CHARS} characters"),
            ));
        } else {
            changes.title = Some(title.clone());
        }
    }

    changes.description = input.description.clone();

    if let Some(raw) = &input.category {
        match raw.parse() {
            Ok(c) => changes.category = Some(c),
            Err(e) => errors.push(FieldError::new("category", e)),
        }
    }
    if let Some(raw) = &input.difficulty {
        match raw.parse() {
            Ok(d) => changes.difficulty = Some(d),
            Err(e) => errors.push(FieldError::new("difficulty", e)),
        }
    }
    if let Some(raw) = &input.scheduled_start {
        match parse_timestamp(raw, tz) {
            Ok(t) => changes.scheduled_start = Some(t),
            Err(e) => errors.push(FieldError::new("scheduled_start", e)),
        }
    }
    if let Some(raw) = &input.scheduled_end {
        match parse_timestamp(raw, tz) {
            Ok(t) => changes.scheduled_end = Some(t),
            Err(e) => errors.push(FieldError::new("scheduled_end", e)),
        }
    }
    if let (Some(start), Some(end)) = (changes.scheduled_start, changes.scheduled_end) {
        if end < start {
            errors.push(schedule_order_error());
        }
    }

    if errors.is_empty() {
        Ok(changes)
    } else {
        Err(QuestError::Validation(errors))
    }
}

/// Validate a create request: the shared field rules plus required fields.
pub fn validate_new(input: &TaskInput, tz: Tz) -> Result<NewTask> {
    let mut missing = Vec::new();
    for (field, value) in [
        ("title", &input.title),
        ("category", &input.category),
        ("difficulty", &input.difficulty),
        ("scheduled_start", &input.scheduled_start),
        ("scheduled_end", &input.scheduled_end),
    ] {
        if value.is_none() {
            missing.push(FieldError::new(field, "is required"));
        }
    }

    let changes = match validate_fields(input, tz) {
        Ok(changes) if missing.is_empty() => changes,
        Ok(_) => return Err(QuestError::Validation(missing)),
        Err(QuestError::Validation(mut errors)) => {
            missing.append(&mut errors);
            return Err(QuestError::Validation(missing));
        }
        Err(e) => return Err(e),
    };

    match changes {
        TaskChanges {
            title: Some(title),
            description,
            category: Some(category),
            difficulty: Some(difficulty),
            scheduled_start: Some(scheduled_start),
            scheduled_end: Some(scheduled_end),
        } => Ok(NewTask {
            title,
            description: description.filter(|d| !d.is_empty()),
            category,
            difficulty,
            scheduled_start,
            scheduled_end,
        }),
        _ => Err(QuestError::validation("input", "incomplete task")),
    }
}

/// Validate an update against the task it will modify.
///
/// Difficulty is fixed at creation, and the merged schedule must stay ordered.
pub fn validate_update(input: &TaskInput, current: &Task, tz: Tz) -> Result<TaskChanges> {
    let mut errors = Vec::new();
    if input.difficulty.is_some() {
        errors.push(FieldError::new("difficulty", "cannot be changed after creation"));
    }

    let changes = match validate_fields(input, tz) {
        Ok(changes) => changes,
        Err(QuestError::Validation(mut field_errors)) => {
            errors.append(&mut field_errors);
            return Err(QuestError::Validation(errors));
        }
        Err(e) => return Err(e),
    };

    let start = changes.scheduled_start.unwrap_or(current.scheduled_start);
    let end = changes.scheduled_end.unwrap_or(current.scheduled_end);
    if end < start && !errors.contains(&schedule_order_error()) {
        errors.push(schedule_order_error());
    }

    if errors.is_empty() {
        Ok(changes)
    } else {
        Err(QuestError::Validation(errors))
    }
}

fn schedule_order_error() -> FieldError {
    FieldError::new("scheduled_end", "must not be before scheduled_start")
}

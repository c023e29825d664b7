//! questboard-core: missions, progression rules and the completion transaction
//! for the Questboard planner.

pub mod completion;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod memory_store;
pub mod mirror;
pub mod planner;
pub mod profile;
pub mod progression;
pub mod store;
pub mod task;
pub mod time;

pub use completion::CompletionReward;
pub use error::{FieldError, QuestError, Result, StoreError};
pub use identity::{authenticate, bearer_token, Caller, IdentityVerifier, VerifiedIdentity};
pub use memory_store::MemoryStore;
pub use mirror::{
    best_effort, event_summary, CalendarGateway, MirrorEvent, MirrorOutcome, MirrorPatch, NoCalendar,
};
pub use planner::{Planner, PlannerConfig};
pub use profile::{Mode, Stat, Stats, UserProfile};
pub use progression::{
    compute_task_xp, decide_level_up, level_from_total_xp, required_xp_for_level, update_stats,
    LevelDecision, BASE_XP, LEVEL_CURVE_EXPONENT,
};
pub use store::{DocumentStore, TaskUpdate, TxnRecords};
pub use task::{
    validate_fields, validate_new, validate_update, Category, Difficulty, NewTask, StatReward, Task,
    TaskChanges, TaskInput, TaskStatus, MAX_TITLE_CHARS,
};
pub use time::parse_timestamp;

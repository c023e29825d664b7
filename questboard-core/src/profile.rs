//! Player profile: level, XP and the four character stats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::progression::required_xp_for_level;

/// XP preset chosen by the player. Applies to future completions only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Monk,
    #[default]
    Beast,
    Recovery,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Monk, Mode::Beast, Mode::Recovery];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Monk => "monk",
            Mode::Beast => "beast",
            Mode::Recovery => "recovery",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("invalid mode '{s}' (expected monk, beast or recovery)"))
    }
}

/// One of the four character attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stat {
    Intelligence,
    Strength,
    Discipline,
    Balance,
}

/// Stat counters. Fields missing from stored data read as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub intelligence: u32,
    pub strength: u32,
    pub discipline: u32,
    pub balance: u32,
}

impl Stats {
    pub fn get(&self, stat: Stat) -> u32 {
        match stat {
            Stat::Intelligence => self.intelligence,
            Stat::Strength => self.strength,
            Stat::Discipline => self.discipline,
            Stat::Balance => self.balance,
        }
    }

    pub(crate) fn counter_mut(&mut self, stat: Stat) -> &mut u32 {
        match stat {
            Stat::Intelligence => &mut self.intelligence,
            Stat::Strength => &mut self.strength,
            Stat::Discipline => &mut self.discipline,
            Stat::Balance => &mut self.balance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,

    pub level: u32,

    /// Cumulative lifetime XP. Never reset on level-up.
    pub current_xp: u64,

    /// Absolute total-XP threshold for the next level-up.
    pub next_level_xp: u64,

    /// Absent in older records; treated as all zeros.
    #[serde(default)]
    pub stats: Option<Stats>,

    #[serde(default)]
    pub mode: Mode,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Fresh level-1 profile, as provisioned on first sign-in.
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            display_name: "Hero".to_string(),
            email: String::new(),
            level: 1,
            current_xp: 0,
            next_level_xp: required_xp_for_level(1),
            stats: Some(Stats::default()),
            mode: Mode::Beast,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.trim().is_empty() {
            self.display_name = name;
        }
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn stats(&self) -> Stats {
        self.stats.unwrap_or_default()
    }
}

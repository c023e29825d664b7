use anyhow::{Context, Result};
use questboard_core::time::parse_tz;
use questboard_core::PlannerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::state::{default_store_path, ensure_questboard_home};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// IANA zone for local `YYYY-MM-DD HH:MM` schedule input.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub calendar: CalendarSection,
    #[serde(default)]
    pub identity: IdentitySection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSection {
    /// Defaults to ~/.questboard/store.json
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarSection {
    pub enabled: bool,
    pub calendar_id: String,
    pub base_url: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityProvider {
    /// Static bearer table in ~/.questboard/tokens.json
    Tokens,
    /// Google ID tokens checked against the tokeninfo endpoint.
    Google,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentitySection {
    pub provider: IdentityProvider,
    /// Expected `aud` claim for Google ID tokens (your OAuth client id).
    pub audience: Option<String>,
    pub tokeninfo_url: String,
    pub timeout_ms: u64,
}

fn default_timezone() -> String {
    "America/Chicago".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            store: StoreSection::default(),
            calendar: CalendarSection::default(),
            identity: IdentitySection::default(),
        }
    }
}

impl Default for CalendarSection {
    fn default() -> Self {
        Self {
            enabled: true,
            calendar_id: "primary".to_string(),
            base_url: "https://www.googleapis.com/calendar/v3".to_string(),
            timeout_ms: 5_000,
        }
    }
}

impl Default for IdentitySection {
    fn default() -> Self {
        Self {
            provider: IdentityProvider::Tokens,
            audience: None,
            tokeninfo_url: "https://oauth2.googleapis.com/tokeninfo".to_string(),
            timeout_ms: 5_000,
        }
    }
}

impl Config {
    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.store.path {
            Some(p) => Ok(p.clone()),
            None => default_store_path(),
        }
    }

    pub fn identity_timeout(&self) -> Duration {
        Duration::from_millis(self.identity.timeout_ms)
    }

    pub fn planner_config(&self) -> Result<PlannerConfig> {
        Ok(PlannerConfig {
            timezone: parse_tz(&self.timezone)?,
            calendar_timeout: Duration::from_millis(self.calendar.timeout_ms),
        })
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_questboard_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).context("parse config.toml")
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<PathBuf> {
    let p = config_path()?;
    if !p.exists() {
        save_config(&Config::default())?;
    }
    Ok(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
timezone = "UTC"

[calendar]
enabled = false
calendar_id = "work"
base_url = "http://localhost:9000"
timeout_ms = 250
"#,
        )
        .unwrap();
        assert!(!cfg.calendar.enabled);
        assert_eq!(cfg.identity.provider, IdentityProvider::Tokens);
        let planner = cfg.planner_config().unwrap();
        assert_eq!(planner.calendar_timeout, Duration::from_millis(250));
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let s = toml::to_string_pretty(&Config::default()).unwrap();
        let back: Config = toml::from_str(&s).unwrap();
        assert_eq!(back.calendar.calendar_id, "primary");
        assert_eq!(back.timezone, "America/Chicago");
    }

    #[test]
    fn bad_timezone_is_reported() {
        let cfg = Config {
            timezone: "Mars/Olympus".to_string(),
            ..Config::default()
        };
        assert!(cfg.planner_config().is_err());
    }
}

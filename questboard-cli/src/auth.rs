//! Local credential files.
//!
//! - `secrets.json`: per-user calendar access tokens captured at sign-in.
//! - `tokens.json`: static bearer table used by the `tokens` identity provider.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::state::{ensure_questboard_home, read_json_or_default, write_json};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarCredentials {
    pub access_token: String,
    /// Stored but not used; token refresh is out of scope.
    pub refresh_token: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecretsFile {
    #[serde(default)]
    pub users: BTreeMap<String, CalendarCredentials>,
}

pub fn secrets_path() -> Result<PathBuf> {
    Ok(ensure_questboard_home()?.join("secrets.json"))
}

pub fn load_secrets(path: &Path) -> Result<SecretsFile> {
    read_json_or_default(path)
}

/// Merge new calendar credentials for `user_id`. A missing refresh token
/// keeps the previously stored one.
pub fn store_calendar_credentials(
    path: &Path,
    user_id: &str,
    access_token: &str,
    refresh_token: Option<&str>,
) -> Result<()> {
    if access_token.trim().is_empty() {
        bail!("access token is empty");
    }
    let mut secrets = load_secrets(path)?;
    let previous_refresh = secrets
        .users
        .get(user_id)
        .and_then(|c| c.refresh_token.clone());
    secrets.users.insert(
        user_id.to_string(),
        CalendarCredentials {
            access_token: access_token.trim().to_string(),
            refresh_token: refresh_token.map(str::to_string).or(previous_refresh),
            updated_at: Utc::now(),
        },
    );
    write_json(path, &secrets)
}

/// What `auth status` reports per user. Never carries token values.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CredentialStatus {
    pub user_id: String,
    pub has_refresh_token: bool,
    pub updated_at: DateTime<Utc>,
}

pub fn credential_status(path: &Path) -> Result<Vec<CredentialStatus>> {
    let secrets = load_secrets(path)?;
    Ok(secrets
        .users
        .into_iter()
        .map(|(user_id, c)| CredentialStatus {
            user_id,
            has_refresh_token: c.refresh_token.is_some(),
            updated_at: c.updated_at,
        })
        .collect())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenEntry {
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TokensFile {
    #[serde(default)]
    pub tokens: BTreeMap<String, TokenEntry>,
}

pub fn tokens_path() -> Result<PathBuf> {
    Ok(ensure_questboard_home()?.join("tokens.json"))
}

pub fn load_tokens(path: &Path) -> Result<TokensFile> {
    read_json_or_default(path)
}

pub fn add_token(path: &Path, token: &str, entry: TokenEntry) -> Result<()> {
    if token.len() < 16 {
        bail!("bearer token too short (need at least 16 characters)");
    }
    if entry.subject.trim().is_empty() {
        bail!("subject is empty");
    }
    let mut tokens = load_tokens(path)?;
    tokens.tokens.insert(token.to_string(), entry);
    write_json(path, &tokens)
}

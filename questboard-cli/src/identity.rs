//! Identity verifiers selectable from config.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use questboard_core::{IdentityVerifier, VerifiedIdentity};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::auth::{load_tokens, TokensFile};
use crate::config::{Config, IdentityProvider};

/// Looks bearers up in the local tokens file.
#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    tokens: TokensFile,
}

impl TokenTable {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self {
            tokens: load_tokens(path)?,
        })
    }
}

#[async_trait]
impl IdentityVerifier for TokenTable {
    async fn verify(&self, bearer: &str) -> Result<VerifiedIdentity> {
        let Some(entry) = self.tokens.tokens.get(bearer) else {
            bail!("unknown bearer token");
        };
        Ok(VerifiedIdentity {
            subject: entry.subject.clone(),
            email: entry.email.clone(),
            name: entry.name.clone(),
        })
    }
}

/// Verifies Google ID tokens via the tokeninfo endpoint.
#[derive(Debug, Clone)]
pub struct GoogleTokenInfo {
    http: reqwest::Client,
    url: String,
    audience: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    sub: String,
    aud: Option<String>,
    email: Option<String>,
    name: Option<String>,
}

impl GoogleTokenInfo {
    pub fn new(url: impl Into<String>, audience: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            url: url.into(),
            audience,
        })
    }
}

#[async_trait]
impl IdentityVerifier for GoogleTokenInfo {
    async fn verify(&self, bearer: &str) -> Result<VerifiedIdentity> {
        let resp = self
            .http
            .get(&self.url)
            .query(&[("id_token", bearer)])
            .send()
            .await
            .context("tokeninfo request")?;

        if !resp.status().is_success() {
            bail!("tokeninfo rejected token: {}", resp.status());
        }
        let info: TokenInfo = resp.json().await.context("parse tokeninfo response")?;

        if let Some(expected) = &self.audience {
            if info.aud.as_deref() != Some(expected.as_str()) {
                bail!("token audience mismatch");
            }
        }

        Ok(VerifiedIdentity {
            subject: info.sub,
            email: info.email,
            name: info.name,
        })
    }
}

/// The verifier chosen by `[identity].provider`.
#[derive(Debug, Clone)]
pub enum Verifier {
    Tokens(TokenTable),
    Google(GoogleTokenInfo),
}

impl Verifier {
    pub fn from_config(cfg: &Config, tokens_path: &Path) -> Result<Self> {
        Ok(match cfg.identity.provider {
            IdentityProvider::Tokens => Verifier::Tokens(TokenTable::load(tokens_path)?),
            IdentityProvider::Google => Verifier::Google(GoogleTokenInfo::new(
                cfg.identity.tokeninfo_url.clone(),
                cfg.identity.audience.clone(),
                cfg.identity_timeout(),
            )?),
        })
    }
}

#[async_trait]
impl IdentityVerifier for Verifier {
    async fn verify(&self, bearer: &str) -> Result<VerifiedIdentity> {
        match self {
            Verifier::Tokens(t) => t.verify(bearer).await,
            Verifier::Google(g) => g.verify(bearer).await,
        }
    }
}

//! Caller identity: bearer credentials are verified once, then the resulting
//! `Caller` is passed explicitly into every operation.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{QuestError, Result};

/// A verified identity. Only obtainable through [`authenticate`] (or
/// [`Caller::trusted`] for callers that verified identity elsewhere).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Caller {
    id: String,
}

impl Caller {
    pub fn trusted(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Claims the identity provider vouches for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify a bearer credential. Any failure means "not authenticated".
    async fn verify(&self, bearer: &str) -> anyhow::Result<VerifiedIdentity>;
}

/// Strip an optional `Bearer ` prefix; empty credentials are rejected.
pub fn bearer_token(raw: &str) -> Option<&str> {
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    (!token.is_empty()).then_some(token)
}

/// Verify `bearer` within `timeout`, failing closed.
///
/// Verifier errors and timeouts both become `Unauthorized`.
pub async fn authenticate<V: IdentityVerifier + ?Sized>(
    verifier: &V,
    bearer: &str,
    timeout: Duration,
) -> Result<(Caller, VerifiedIdentity)> {
    let token = bearer_token(bearer).ok_or(QuestError::Unauthorized)?;

    match tokio::time::timeout(timeout, verifier.verify(token)).await {
        Ok(Ok(identity)) if !identity.subject.is_empty() => {
            Ok((Caller::trusted(identity.subject.clone()), identity))
        }
        Ok(Ok(_)) => {
            tracing::warn!("identity verifier returned an empty subject");
            Err(QuestError::Unauthorized)
        }
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "bearer verification failed");
            Err(QuestError::Unauthorized)
        }
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "identity verification timed out");
            Err(QuestError::Unauthorized)
        }
    }
}

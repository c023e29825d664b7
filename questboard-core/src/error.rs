//! Error types for questboard operations.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A rejected input field and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Failures raised by a document store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another writer held the records; safe to retry from scratch.
    #[error("transaction contention on {0}")]
    Contention(String),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Caller-facing error taxonomy. None of these are retried by the core.
#[derive(Debug, Error)]
pub enum QuestError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid input: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("forbidden")]
    Forbidden,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QuestError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        QuestError::Validation(vec![FieldError::new(field, message)])
    }

    /// Stable machine-readable code for the response surface.
    pub fn code(&self) -> &'static str {
        match self {
            QuestError::Unauthorized => "unauthorized",
            QuestError::Validation(_) => "validation_error",
            QuestError::NotFound(_) => "not_found",
            QuestError::Forbidden => "forbidden",
            QuestError::Conflict(_) => "conflict",
            QuestError::Store(_) => "store_error",
        }
    }

    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            QuestError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, QuestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_every_field() {
        let err = QuestError::Validation(vec![
            FieldError::new("title", "is required"),
            FieldError::new("category", "unknown value 'chores'"),
        ]);
        assert_eq!(
            err.to_string(),
            "invalid input: title: is required; category: unknown value 'chores'"
        );
        assert_eq!(err.code(), "validation_error");
        assert_eq!(err.field_errors().len(), 2);
    }

    #[test]
    fn store_errors_keep_their_own_code() {
        let err: QuestError = StoreError::Poisoned.into();
        assert_eq!(err.code(), "store_error");
    }
}

//! Error types for the Cold Case evidence engine.
//!
//! A single error enum covers the whole workspace. Loader failures are
//! recovered where they happen; quota denials and completion failures are
//! surfaced to the caller as distinct variants so they can be told apart
//! from genuine faults.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for the Cold Case workspace.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A document's bytes could not be decoded at all
    #[error("Unreadable document {path:?}: {reason}")]
    UnreadableDocument { path: PathBuf, reason: String },

    /// The user has used up the questions allowed in the current window
    #[error("Daily limit of {limit} questions reached; resets at {resets_at}")]
    DailyLimitReached {
        limit: u32,
        resets_at: DateTime<Utc>,
    },

    /// The completion service failed or timed out
    #[error("Completion service unavailable: {0}")]
    CompletionUnavailable(String),

    /// Persistence (SQLite) errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Build an `UnreadableDocument` error.
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        AppError::UnreadableDocument {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this is the user-facing daily limit denial.
    pub fn is_quota_denial(&self) -> bool {
        matches!(self, AppError::DailyLimitReached { .. })
    }

    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::CompletionUnavailable(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

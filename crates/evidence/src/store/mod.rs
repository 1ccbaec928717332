//! Persistence collaborators: chat history, quota state and index snapshots.
//!
//! The engine only talks to these traits. [`MemoryStore`] backs tests and
//! throwaway sessions; [`SqliteStore`] is what the CLI opens.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::types::{ChatRecord, Document};
use chrono::{DateTime, Utc};
use coldcase_core::AppResult;
use std::collections::HashMap;

/// Persisted quota window and per-user counts.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaSnapshot {
    pub reset_at: DateTime<Utc>,
    pub used: HashMap<String, u32>,
}

/// A persisted corpus generation.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSnapshot {
    /// Fingerprint of the evidence folder the documents were read from
    pub fingerprint: String,
    pub built_at: DateTime<Utc>,
    pub documents: Vec<Document>,
}

/// Per-user chat history with newest-N retention.
pub trait HistoryStore: Send + Sync {
    /// Append a record, then drop all but the newest `keep` for that user.
    fn append_chat(&self, record: &ChatRecord, keep: usize) -> AppResult<()>;

    /// Records for a user, oldest first.
    fn recent_chats(&self, username: &str) -> AppResult<Vec<ChatRecord>>;

    /// Remove a user's history, returning how many records were deleted.
    fn clear_chats(&self, username: &str) -> AppResult<usize>;
}

/// Write-through storage for the quota ledger.
pub trait QuotaStore: Send + Sync {
    fn load_quota(&self) -> AppResult<Option<QuotaSnapshot>>;

    fn save_usage(&self, username: &str, used: u32) -> AppResult<()>;

    /// Start a new window: every count goes to zero.
    fn reset_window(&self, reset_at: DateTime<Utc>) -> AppResult<()>;
}

/// Storage for the most recent corpus generation.
pub trait SnapshotStore: Send + Sync {
    fn save_snapshot(&self, snapshot: &IndexSnapshot) -> AppResult<()>;

    fn load_snapshot(&self) -> AppResult<Option<IndexSnapshot>>;
}

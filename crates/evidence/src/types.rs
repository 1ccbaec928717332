//! Evidence engine type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One indexed evidence file. `full_text` is never blank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// File name inside the evidence folder (e.g. "case1.txt")
    pub source_name: String,

    /// Decoded text of the whole file
    pub full_text: String,
}

/// An excerpt handed to the answer composer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Excerpt text, truncated to the configured maximum
    pub content: String,

    /// Source file name, used as the citation
    pub source: String,
}

/// Answer text plus the sources it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedAnswer {
    pub answer: String,

    /// Distinct source names among the retrieved chunks, sorted
    pub citations: Vec<String>,
}

/// Full result of asking a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskOutcome {
    pub answer: String,
    pub citations: Vec<String>,
    pub chunks: Vec<RetrievedChunk>,
}

/// Statistics from a full index rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildStats {
    /// Documents that made it into the index
    pub indexed: usize,

    /// Recognized files whose text was blank
    pub skipped_empty: usize,

    /// Recognized files that could not be decoded
    pub skipped_unreadable: usize,

    /// Files without a `.txt`/`.pdf` extension
    pub ignored: usize,

    /// Generation number of the published index
    pub generation: u64,

    /// Duration in seconds
    pub duration_secs: f64,
}

/// Result of an upload: the stored name and the rebuild it triggered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReport {
    pub file_name: String,
    pub rebuild: RebuildStats,
}

/// Lifecycle state of the corpus index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexState {
    /// Never built or loaded in this process
    Absent,
    /// Built, but no file yielded any text
    Empty,
    /// Built with at least one document
    Built,
}

/// Snapshot of the index for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub state: IndexState,
    pub documents: usize,
    pub vocabulary: usize,
    pub generation: Option<u64>,
    pub built_at: Option<DateTime<Utc>>,
    pub sources: Vec<String>,
}

/// Quota usage for one user in the current window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub used: u32,
    pub remaining: u32,
    pub limit: u32,
    pub resets_at: DateTime<Utc>,
}

/// One persisted question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub username: String,
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

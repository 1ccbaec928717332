//! Cold Case evidence engine.
//!
//! Loads `.txt`/`.pdf` evidence from a folder, keeps a TF-IDF index over
//! it, and answers questions grounded in the best matching files. Each user
//! gets a rolling daily question quota and a short chat history.
//!
//! # Example
//! ```no_run
//! use coldcase_evidence::EvidenceEngine;
//! use coldcase_llm::create_client;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = create_client("ollama", None, None, None)?;
//! let engine = EvidenceEngine::builder("evidence")
//!     .client(client)
//!     .model("llama3.2")
//!     .build()?;
//!
//! engine.upload("case1.txt", b"The suspect wore a red jacket.")?;
//! let outcome = engine.ask("detective", "What did the suspect wear?").await?;
//! println!("{} {:?}", outcome.answer, outcome.citations);
//! # Ok(())
//! # }
//! ```

pub mod composer;
pub mod config;
pub mod engine;
pub mod index;
pub mod loader;
pub mod quota;
pub mod retriever;
pub mod store;
pub mod types;
pub mod vector;

#[cfg(test)]
mod tests;

pub use composer::{AnswerComposer, NO_EVIDENCE_ANSWER};
pub use config::EngineConfig;
pub use engine::{connect_client, EvidenceEngine, EvidenceEngineBuilder};
pub use index::{CorpusGeneration, CorpusIndex};
pub use quota::{Clock, QuotaDecision, QuotaTicket, QuotaTracker, SystemClock};
pub use retriever::Retriever;
pub use store::{HistoryStore, MemoryStore, QuotaStore, SnapshotStore, SqliteStore};
pub use types::{
    AskOutcome, ChatRecord, ComposedAnswer, Document, IndexState, IndexStats, QuotaStatus,
    RebuildStats, RetrievedChunk, UploadReport,
};
pub use vector::{TfIdfVectorizer, Vectorizer};

//! Top-k retrieval with bounded excerpts.

use crate::index::CorpusIndex;
use crate::types::RetrievedChunk;
use std::sync::Arc;

/// Default number of documents handed to the composer.
pub const DEFAULT_TOP_K: usize = 3;

/// Default excerpt length, in characters.
pub const DEFAULT_MAX_EXCERPT_CHARS: usize = 1500;

#[derive(Debug, Clone)]
pub struct Retriever {
    index: Arc<CorpusIndex>,
    top_k: usize,
    max_excerpt_chars: usize,
}

impl Retriever {
    pub fn new(index: Arc<CorpusIndex>) -> Self {
        Self {
            index,
            top_k: DEFAULT_TOP_K,
            max_excerpt_chars: DEFAULT_MAX_EXCERPT_CHARS,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_max_excerpt_chars(mut self, max: usize) -> Self {
        self.max_excerpt_chars = max;
        self
    }

    /// Retrieve the configured number of chunks for a question.
    pub fn retrieve(&self, question: &str) -> Vec<RetrievedChunk> {
        self.retrieve_top(question, self.top_k)
    }

    /// Retrieve at most `k` chunks, best first.
    pub fn retrieve_top(&self, question: &str, k: usize) -> Vec<RetrievedChunk> {
        if k == 0 {
            return Vec::new();
        }

        self.index
            .query(question)
            .into_iter()
            .take(k)
            .map(|(doc, score)| {
                tracing::debug!("Retrieved {} (score {:.4})", doc.source_name, score);
                RetrievedChunk {
                    content: truncate_excerpt(&doc.full_text, self.max_excerpt_chars),
                    source: doc.source_name,
                }
            })
            .collect()
    }
}

/// Keep at most `max_chars` characters without splitting one.
pub fn truncate_excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

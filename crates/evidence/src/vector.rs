//! Document vectorization and similarity.
//!
//! The index is built through the [`Vectorizer`] trait so the weighting
//! scheme can be swapped without touching retrieval. The shipped scheme is
//! TF-IDF over lower-cased alphanumeric tokens with unit-length sparse
//! vectors, which makes cosine similarity a plain dot product.

use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A sparse vector stored as `(term_id, weight)` pairs sorted by term id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(u32, f32)>,
}

impl SparseVector {
    /// Build from unsorted pairs. Zero weights are dropped.
    pub fn from_pairs(mut pairs: Vec<(u32, f32)>) -> Self {
        pairs.retain(|(_, w)| *w != 0.0);
        pairs.sort_by_key(|(id, _)| *id);
        Self { entries: pairs }
    }

    pub fn entries(&self) -> &[(u32, f32)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn norm(&self) -> f32 {
        self.entries.iter().map(|(_, w)| w * w).sum::<f32>().sqrt()
    }

    /// Scale to unit length. The zero vector stays zero.
    pub fn normalized(mut self) -> Self {
        let norm = self.norm();
        if norm > 0.0 {
            for (_, w) in &mut self.entries {
                *w /= norm;
            }
        }
        self
    }

    /// Dot product via a merge over both sorted entry lists.
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.entries.len() && j < other.entries.len() {
            let (a_id, a_w) = self.entries[i];
            let (b_id, b_w) = other.entries[j];
            match a_id.cmp(&b_id) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += a_w * b_w;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }
}

/// A fitted representation that can project new text and score pairs.
pub trait VectorSpace: Send + Sync + std::fmt::Debug {
    /// Project text into the space. Unknown terms contribute nothing.
    fn vectorize(&self, text: &str) -> SparseVector;

    /// Similarity between two vectors of this space. Never NaN.
    fn similarity(&self, a: &SparseVector, b: &SparseVector) -> f32 {
        let score = a.dot(b);
        if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Number of distinct terms the space knows about.
    fn dimensions(&self) -> usize;
}

/// Output of fitting a vectorizer to a corpus.
#[derive(Debug)]
pub struct FittedCorpus {
    pub space: Box<dyn VectorSpace>,

    /// One vector per input text, in input order
    pub vectors: Vec<SparseVector>,
}

/// Strategy for turning a corpus into vectors.
pub trait Vectorizer: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    fn fit(&self, texts: &[&str]) -> FittedCorpus;
}

/// Split text into lower-cased alphanumeric tokens.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn term_counts(text: &str) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}

/// TF-IDF with smoothed inverse document frequency.
#[derive(Debug, Default, Clone, Copy)]
pub struct TfIdfVectorizer;

impl Vectorizer for TfIdfVectorizer {
    fn name(&self) -> &str {
        "tfidf"
    }

    fn fit(&self, texts: &[&str]) -> FittedCorpus {
        let counts: Vec<HashMap<String, u32>> = texts.iter().map(|t| term_counts(t)).collect();

        // Term ids follow lexical order so the same corpus always yields the same ids.
        let terms: BTreeSet<&str> = counts
            .iter()
            .flat_map(|c| c.keys().map(String::as_str))
            .collect();

        let mut document_frequency: BTreeMap<&str, u32> = BTreeMap::new();
        for doc in &counts {
            for term in doc.keys() {
                *document_frequency.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        let n = texts.len() as f32;
        let mut vocabulary = HashMap::with_capacity(terms.len());
        let mut idf = Vec::with_capacity(terms.len());
        for (id, term) in terms.iter().enumerate() {
            let df = document_frequency.get(term).copied().unwrap_or(0) as f32;
            vocabulary.insert(term.to_string(), id as u32);
            idf.push(((1.0 + n) / (1.0 + df)).ln() + 1.0);
        }

        let space = TfIdfSpace { vocabulary, idf };
        let vectors = counts.iter().map(|c| space.weigh(c)).collect();

        tracing::debug!(
            "Fitted tfidf over {} documents ({} terms)",
            texts.len(),
            space.dimensions()
        );

        FittedCorpus {
            space: Box::new(space),
            vectors,
        }
    }
}

/// Vocabulary and IDF weights learned from a corpus.
#[derive(Debug, Clone)]
pub struct TfIdfSpace {
    vocabulary: HashMap<String, u32>,
    idf: Vec<f32>,
}

impl TfIdfSpace {
    fn weigh(&self, counts: &HashMap<String, u32>) -> SparseVector {
        let pairs = counts
            .iter()
            .filter_map(|(term, tf)| {
                let id = *self.vocabulary.get(term)?;
                let idf = self.idf.get(id as usize)?;
                Some((id, *tf as f32 * idf))
            })
            .collect();
        SparseVector::from_pairs(pairs).normalized()
    }
}

impl VectorSpace for TfIdfSpace {
    fn vectorize(&self, text: &str) -> SparseVector {
        self.weigh(&term_counts(text))
    }

    fn dimensions(&self) -> usize {
        self.idf.len()
    }
}

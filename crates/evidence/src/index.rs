//! Corpus index with atomic generation swap.
//!
//! A rebuild reads the whole evidence folder, fits a fresh vector space and
//! publishes it as a new [`CorpusGeneration`]. Readers clone the current
//! `Arc` and keep using it even if a newer generation is published
//! meanwhile. Rebuilds are serialized by a separate build lock, so queries
//! never wait on one.

use crate::loader::{self, DocumentKind};
use crate::store::{IndexSnapshot, SnapshotStore};
use crate::types::{Document, IndexState, IndexStats, RebuildStats};
use crate::vector::{SparseVector, VectorSpace, Vectorizer};
use chrono::{DateTime, Utc};
use coldcase_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;
use walkdir::WalkDir;

/// One immutable, fully built index state.
#[derive(Debug)]
pub struct CorpusGeneration {
    pub generation: u64,
    pub built_at: DateTime<Utc>,
    pub fingerprint: String,
    pub documents: Vec<Document>,
    space: Box<dyn VectorSpace>,
    vectors: Vec<SparseVector>,
}

impl CorpusGeneration {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn vocabulary(&self) -> usize {
        self.space.dimensions()
    }

    /// Score every document against `text`, best first. Ties keep file order.
    pub fn rank(&self, text: &str) -> Vec<(Document, f32)> {
        let query = self.space.vectorize(text);

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, self.space.similarity(&query, v)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        scored
            .into_iter()
            .map(|(i, score)| (self.documents[i].clone(), score))
            .collect()
    }
}

/// A recognized file as read from the evidence folder.
struct RawEvidence {
    path: PathBuf,
    name: String,
    bytes: std::io::Result<Vec<u8>>,
}

struct FolderListing {
    files: Vec<RawEvidence>,
    ignored: usize,
}

/// Read every recognized file directly inside `dir`, in file-name order.
///
/// A missing folder is an empty listing.
fn read_folder(dir: &Path) -> FolderListing {
    let mut listing = FolderListing {
        files: Vec::new(),
        ignored: 0,
    };

    if !dir.is_dir() {
        tracing::debug!("Evidence folder {:?} does not exist yet", dir);
        return listing;
    }

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry in {:?}: {}", dir, e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path().to_path_buf();
        if DocumentKind::from_path(&path).is_none() {
            tracing::debug!("Ignoring unsupported file {:?}", path);
            listing.ignored += 1;
            continue;
        }

        listing.files.push(RawEvidence {
            name: entry.file_name().to_string_lossy().to_string(),
            bytes: fs::read(&path),
            path,
        });
    }

    listing
}

fn fingerprint_files(files: &[RawEvidence]) -> String {
    let mut hasher = Sha256::new();
    for file in files {
        hasher.update(file.name.as_bytes());
        hasher.update([0u8]);
        match &file.bytes {
            Ok(bytes) => {
                hasher.update((bytes.len() as u64).to_le_bytes());
                hasher.update(bytes);
            }
            Err(_) => hasher.update(b"<unreadable>"),
        }
    }
    format!("{:x}", hasher.finalize())
}

/// SHA-256 over the names and contents of the recognized files in `dir`.
pub fn folder_fingerprint(dir: &Path) -> String {
    fingerprint_files(&read_folder(dir).files)
}

/// The shared corpus index.
pub struct CorpusIndex {
    evidence_dir: PathBuf,
    vectorizer: Box<dyn Vectorizer>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    current: RwLock<Option<Arc<CorpusGeneration>>>,
    build_lock: Mutex<()>,
    generations: AtomicU64,
}

impl std::fmt::Debug for CorpusIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusIndex")
            .field("evidence_dir", &self.evidence_dir)
            .field("vectorizer", &self.vectorizer.name())
            .field("state", &self.state())
            .finish()
    }
}

impl CorpusIndex {
    pub fn new(evidence_dir: impl Into<PathBuf>, vectorizer: Box<dyn Vectorizer>) -> Self {
        Self {
            evidence_dir: evidence_dir.into(),
            vectorizer,
            snapshots: None,
            current: RwLock::new(None),
            build_lock: Mutex::new(()),
            generations: AtomicU64::new(0),
        }
    }

    /// Persist every generation to `store` and try it before the first rebuild.
    pub fn with_snapshots(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(store);
        self
    }

    pub fn evidence_dir(&self) -> &Path {
        &self.evidence_dir
    }

    /// The published generation, if any.
    pub fn current(&self) -> Option<Arc<CorpusGeneration>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> IndexState {
        match self.current() {
            None => IndexState::Absent,
            Some(generation) if generation.is_empty() => IndexState::Empty,
            Some(_) => IndexState::Built,
        }
    }

    pub fn stats(&self) -> IndexStats {
        let current = self.current();
        IndexStats {
            state: self.state(),
            documents: current.as_ref().map_or(0, |g| g.documents.len()),
            vocabulary: current.as_ref().map_or(0, |g| g.vocabulary()),
            generation: current.as_ref().map(|g| g.generation),
            built_at: current.as_ref().map(|g| g.built_at),
            sources: current
                .as_ref()
                .map(|g| g.documents.iter().map(|d| d.source_name.clone()).collect())
                .unwrap_or_default(),
        }
    }

    /// Rebuild from the evidence folder and publish the result.
    pub fn rebuild(&self) -> AppResult<RebuildStats> {
        let _guard = self.build_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.rebuild_locked()
    }

    fn rebuild_locked(&self) -> AppResult<RebuildStats> {
        let start = Instant::now();
        tracing::info!("Rebuilding corpus index from {:?}", self.evidence_dir);

        let listing = read_folder(&self.evidence_dir);
        let fingerprint = fingerprint_files(&listing.files);

        let mut documents = Vec::new();
        let mut skipped_empty = 0;
        let mut skipped_unreadable = 0;

        for file in listing.files {
            let decoded = match file.bytes {
                Ok(bytes) => loader::load_bytes(&file.path, &bytes),
                Err(e) => Err(AppError::unreadable(&file.path, e)),
            };

            match decoded {
                Ok(text) if text.trim().is_empty() => {
                    tracing::debug!("Skipping {} (no text)", file.name);
                    skipped_empty += 1;
                }
                Ok(text) => documents.push(Document {
                    source_name: file.name,
                    full_text: text,
                }),
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", file.name, e);
                    skipped_unreadable += 1;
                }
            }
        }

        let built_at = Utc::now();
        let generation = self.publish(documents, fingerprint, built_at);
        self.save_snapshot(&generation);

        let stats = RebuildStats {
            indexed: generation.documents.len(),
            skipped_empty,
            skipped_unreadable,
            ignored: listing.ignored,
            generation: generation.generation,
            duration_secs: start.elapsed().as_secs_f64(),
        };

        tracing::info!(
            "Published generation {}: {} indexed, {} empty, {} unreadable, {} ignored in {:.2}s",
            stats.generation,
            stats.indexed,
            stats.skipped_empty,
            stats.skipped_unreadable,
            stats.ignored,
            stats.duration_secs
        );

        Ok(stats)
    }

    /// Fit the vectorizer and swap the new generation in.
    fn publish(
        &self,
        documents: Vec<Document>,
        fingerprint: String,
        built_at: DateTime<Utc>,
    ) -> Arc<CorpusGeneration> {
        let texts: Vec<&str> = documents.iter().map(|d| d.full_text.as_str()).collect();
        let fitted = self.vectorizer.fit(&texts);

        let generation = Arc::new(CorpusGeneration {
            generation: self.generations.fetch_add(1, Ordering::SeqCst) + 1,
            built_at,
            fingerprint,
            documents,
            space: fitted.space,
            vectors: fitted.vectors,
        });

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(generation.clone());
        generation
    }

    fn save_snapshot(&self, generation: &CorpusGeneration) {
        let Some(store) = &self.snapshots else {
            return;
        };

        let snapshot = IndexSnapshot {
            fingerprint: generation.fingerprint.clone(),
            built_at: generation.built_at,
            documents: generation.documents.clone(),
        };
        if let Err(e) = store.save_snapshot(&snapshot) {
            tracing::warn!("Failed to persist index snapshot: {}", e);
        }
    }

    /// Return the current generation, loading or building one if absent.
    ///
    /// A stored snapshot is only used when its fingerprint matches the
    /// folder as it is now.
    pub fn load(&self) -> AppResult<Arc<CorpusGeneration>> {
        if let Some(generation) = self.current() {
            return Ok(generation);
        }

        let _guard = self.build_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(generation) = self.current() {
            return Ok(generation);
        }

        if let Some(store) = &self.snapshots {
            match store.load_snapshot() {
                Ok(Some(snapshot)) => {
                    let fingerprint = folder_fingerprint(&self.evidence_dir);
                    if snapshot.fingerprint == fingerprint {
                        tracing::info!(
                            "Restored index snapshot with {} documents",
                            snapshot.documents.len()
                        );
                        return Ok(self.publish(
                            snapshot.documents,
                            snapshot.fingerprint,
                            snapshot.built_at,
                        ));
                    }
                    tracing::info!("Index snapshot is stale, rebuilding");
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Failed to read index snapshot: {}", e),
            }
        }

        self.rebuild_locked()?;
        self.current()
            .ok_or_else(|| AppError::Other("Index missing after rebuild".to_string()))
    }

    /// All documents ranked against `text`, best first.
    ///
    /// An index that cannot be loaded, or one with no documents, yields an
    /// empty result rather than an error.
    pub fn query(&self, text: &str) -> Vec<(Document, f32)> {
        let generation = match self.load() {
            Ok(generation) => generation,
            Err(e) => {
                tracing::warn!("Corpus index unavailable: {}", e);
                return Vec::new();
            }
        };

        if generation.is_empty() {
            return Vec::new();
        }

        let ranked = generation.rank(text);
        tracing::debug!(
            "Query scored {} documents against generation {}",
            ranked.len(),
            generation.generation
        );
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::vector::TfIdfVectorizer;
    use tempfile::TempDir;

    fn index_for(dir: &Path) -> CorpusIndex {
        CorpusIndex::new(dir, Box::new(TfIdfVectorizer))
    }

    #[test]
    fn test_absent_then_built() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("case1.txt"), "The suspect wore a red jacket.").unwrap();

        let index = index_for(temp.path());
        assert_eq!(index.state(), IndexState::Absent);

        let stats = index.rebuild().unwrap();
        assert_eq!(stats.indexed, 1);
        assert_eq!(stats.generation, 1);
        assert_eq!(index.state(), IndexState::Built);
    }

    #[test]
    fn test_rebuild_counts_skips() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "witness saw a van").unwrap();
        fs::write(temp.path().join("blank.txt"), "   \n\t").unwrap();
        fs::write(temp.path().join("bad.txt"), [0xffu8, 0xfe]).unwrap();
        fs::write(temp.path().join("photo.jpg"), [1u8, 2, 3]).unwrap();
        fs::create_dir(temp.path().join("nested")).unwrap();
        fs::write(temp.path().join("nested").join("deep.txt"), "ignored").unwrap();

        let stats = index_for(temp.path()).rebuild().unwrap();
        assert_eq!(stats.indexed, 1);
        assert_eq!(stats.skipped_empty, 1);
        assert_eq!(stats.skipped_unreadable, 1);
        assert_eq!(stats.ignored, 1);
    }

    #[test]
    fn test_only_unreadable_files_is_empty_state() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("bad.pdf"), b"garbage").unwrap();

        let index = index_for(temp.path());
        index.rebuild().unwrap();

        assert_eq!(index.state(), IndexState::Empty);
        assert!(index.query("anything").is_empty());
    }

    #[test]
    fn test_missing_folder_is_empty() {
        let temp = TempDir::new().unwrap();
        let index = index_for(&temp.path().join("nope"));

        assert!(index.query("jacket").is_empty());
        assert_eq!(index.state(), IndexState::Empty);
    }

    #[test]
    fn test_query_sorted_and_deterministic() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "The car was parked at the docks.").unwrap();
        fs::write(temp.path().join("b.txt"), "The suspect wore a red jacket.").unwrap();
        fs::write(temp.path().join("c.txt"), "A red car left the docks at night.").unwrap();

        let index = index_for(temp.path());
        index.rebuild().unwrap();

        let first = index.query("red jacket suspect");
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].0.source_name, "b.txt");
        for pair in first.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }

        let second = index.query("red jacket suspect");
        assert_eq!(first, second);
    }

    #[test]
    fn test_ties_keep_file_order() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.txt"), "alpha").unwrap();
        fs::write(temp.path().join("a.txt"), "beta").unwrap();

        let index = index_for(temp.path());
        index.rebuild().unwrap();

        let ranked = index.query("unrelated");
        let names: Vec<&str> = ranked.iter().map(|(d, _)| d.source_name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_implicit_load_builds_on_first_query() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("case1.txt"), "red jacket").unwrap();

        let index = index_for(temp.path());
        let ranked = index.query("jacket");
        assert_eq!(ranked.len(), 1);
        assert_eq!(index.stats().generation, Some(1));
    }

    #[test]
    fn test_matching_snapshot_is_restored() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("case1.txt"), "red jacket").unwrap();
        let store = Arc::new(MemoryStore::new());

        let first = index_for(temp.path()).with_snapshots(store.clone());
        first.rebuild().unwrap();
        let saved = store.load_snapshot().unwrap().unwrap();

        let second = index_for(temp.path()).with_snapshots(store.clone());
        let generation = second.load().unwrap();
        assert_eq!(generation.built_at, saved.built_at);
        assert_eq!(generation.documents, saved.documents);
    }

    #[test]
    fn test_stale_snapshot_is_never_served() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("case1.txt"), "red jacket").unwrap();
        let store = Arc::new(MemoryStore::new());

        index_for(temp.path())
            .with_snapshots(store.clone())
            .rebuild()
            .unwrap();

        fs::write(temp.path().join("case1.txt"), "blue raincoat").unwrap();

        let index = index_for(temp.path()).with_snapshots(store.clone());
        let ranked = index.query("raincoat");
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].0.full_text, "blue raincoat");

        let resaved = store.load_snapshot().unwrap().unwrap();
        assert_eq!(resaved.fingerprint, folder_fingerprint(temp.path()));
    }

    #[test]
    fn test_reader_keeps_old_generation_across_rebuild() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "first version").unwrap();

        let index = index_for(temp.path());
        index.rebuild().unwrap();
        let held = index.current().unwrap();

        fs::write(temp.path().join("b.txt"), "second file").unwrap();
        index.rebuild().unwrap();

        assert_eq!(held.documents.len(), 1);
        assert_eq!(index.current().unwrap().documents.len(), 2);
        assert_eq!(index.current().unwrap().generation, 2);
    }

    #[test]
    fn test_queries_during_rebuilds_see_whole_generations() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "red jacket near the docks").unwrap();
        fs::write(temp.path().join("b.txt"), "blue van at the station").unwrap();

        let index = index_for(temp.path());
        index.rebuild().unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..20 {
                    index.rebuild().unwrap();
                }
            });

            for _ in 0..4 {
                scope.spawn(|| {
                    let mut last_seen = 0;
                    for _ in 0..50 {
                        let ranked = index.query("red jacket");
                        assert_eq!(ranked.len(), 2);
                        assert_eq!(ranked[0].0.source_name, "a.txt");

                        let generation = index.current().unwrap();
                        assert_eq!(generation.documents.len(), 2);
                        assert!(generation.generation >= last_seen);
                        last_seen = generation.generation;
                    }
                });
            }
        });

        assert_eq!(index.current().unwrap().generation, 21);
    }
}

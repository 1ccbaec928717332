//! The evidence engine: one handle owning the index, quota, composer and stores.

use crate::composer::AnswerComposer;
use crate::config::{self, EngineConfig};
use crate::index::CorpusIndex;
use crate::loader::DocumentKind;
use crate::quota::{Clock, QuotaTracker, SystemClock};
use crate::retriever::Retriever;
use crate::store::{HistoryStore, MemoryStore, QuotaStore, SnapshotStore, SqliteStore};
use crate::types::{AskOutcome, ChatRecord, IndexStats, QuotaStatus, RebuildStats, UploadReport};
use crate::vector::{TfIdfVectorizer, Vectorizer};
use chrono::Utc;
use coldcase_core::{AppConfig, AppError, AppResult};
use coldcase_llm::{create_client, LlmClient};
use coldcase_prompt::{builtin_prompt, load_prompt, PromptDefinition, ANSWER_PROMPT_ID};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub struct EvidenceEngine {
    config: EngineConfig,
    index: Arc<CorpusIndex>,
    retriever: Retriever,
    composer: AnswerComposer,
    quota: QuotaTracker,
    history: Arc<dyn HistoryStore>,
}

impl std::fmt::Debug for EvidenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceEngine")
            .field("config", &self.config)
            .field("index", &self.index)
            .field("composer", &self.composer)
            .field("quota", &self.quota)
            .finish_non_exhaustive()
    }
}

/// Assembles an [`EvidenceEngine`]. Unset collaborators default to an
/// in-memory store, the system clock, TF-IDF and the built-in prompt.
/// Without a client the engine can index and report, but `ask` fails once
/// there is evidence to answer from.
pub struct EvidenceEngineBuilder {
    evidence_dir: PathBuf,
    client: Option<Arc<dyn LlmClient>>,
    config: EngineConfig,
    model: String,
    prompt: Option<PromptDefinition>,
    clock: Arc<dyn Clock>,
    vectorizer: Box<dyn Vectorizer>,
    history: Option<Arc<dyn HistoryStore>>,
    quota_store: Option<Arc<dyn QuotaStore>>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
}

impl EvidenceEngineBuilder {
    pub fn client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn prompt(mut self, prompt: PromptDefinition) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn vectorizer(mut self, vectorizer: Box<dyn Vectorizer>) -> Self {
        self.vectorizer = vectorizer;
        self
    }

    /// Use one backend for history, quota and snapshots.
    pub fn store<S>(mut self, store: Arc<S>) -> Self
    where
        S: HistoryStore + QuotaStore + SnapshotStore + 'static,
    {
        let history: Arc<dyn HistoryStore> = store.clone();
        let quota_store: Arc<dyn QuotaStore> = store.clone();
        let snapshots: Arc<dyn SnapshotStore> = store;
        self.history = Some(history);
        self.quota_store = Some(quota_store);
        self.snapshots = Some(snapshots);
        self
    }

    pub fn build(self) -> AppResult<EvidenceEngine> {
        let prompt = match self.prompt {
            Some(prompt) => prompt,
            None => builtin_prompt(ANSWER_PROMPT_ID).ok_or_else(|| {
                AppError::Prompt(format!("Built-in prompt '{}' missing", ANSWER_PROMPT_ID))
            })?,
        };

        let memory = Arc::new(MemoryStore::new());
        let history = self
            .history
            .unwrap_or_else(|| memory.clone() as Arc<dyn HistoryStore>);
        let quota_store = self
            .quota_store
            .unwrap_or_else(|| memory.clone() as Arc<dyn QuotaStore>);

        let mut index = CorpusIndex::new(self.evidence_dir, self.vectorizer);
        if let Some(snapshots) = self.snapshots {
            index = index.with_snapshots(snapshots);
        }
        let index = Arc::new(index);

        let retriever = Retriever::new(index.clone())
            .with_top_k(self.config.top_k)
            .with_max_excerpt_chars(self.config.max_excerpt_chars);

        let quota = QuotaTracker::with_store(
            self.config.daily_limit,
            self.config.window(),
            self.clock,
            quota_store,
        )?;

        Ok(EvidenceEngine {
            index,
            retriever,
            composer: AnswerComposer::new(self.client, self.model, prompt),
            quota,
            history,
            config: self.config,
        })
    }
}

/// Create the completion client for the configured provider.
pub fn connect_client(app: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let api_key = app.resolve_api_key(&app.provider);
    tracing::debug!(provider = %app.provider, model = %app.model, "Connecting completion client");
    create_client(
        &app.provider,
        app.endpoint(),
        api_key.as_deref(),
        app.timeout_secs().map(Duration::from_secs),
    )
}

impl EvidenceEngine {
    pub fn builder(evidence_dir: impl Into<PathBuf>) -> EvidenceEngineBuilder {
        EvidenceEngineBuilder {
            evidence_dir: evidence_dir.into(),
            client: None,
            config: EngineConfig::default(),
            model: String::new(),
            prompt: None,
            clock: Arc::new(SystemClock),
            vectorizer: Box::new(TfIdfVectorizer),
            history: None,
            quota_store: None,
            snapshots: None,
        }
    }

    /// Open the engine for a workspace: engine config, SQLite store and
    /// prompt come from the workspace. Pass a client to enable answering.
    pub fn open(app: &AppConfig, client: Option<Arc<dyn LlmClient>>) -> AppResult<Self> {
        let workspace = app.workspace.as_path();
        let config = config::load_config(workspace)?;
        let store = Arc::new(SqliteStore::open(&config::get_database_path(workspace))?);
        let prompt = load_prompt(workspace, ANSWER_PROMPT_ID)?;

        let mut builder = Self::builder(config.evidence_path(workspace))
            .model(app.model.clone())
            .prompt(prompt)
            .store(store)
            .config(config);
        if let Some(client) = client {
            builder = builder.client(client);
        }
        builder.build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn evidence_dir(&self) -> &Path {
        self.index.evidence_dir()
    }

    /// Store a file in the evidence folder and rebuild the index.
    ///
    /// Only the final path component of `name` is used.
    pub fn upload(&self, name: &str, bytes: &[u8]) -> AppResult<UploadReport> {
        let file_name = Path::new(name)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| AppError::unreadable(name, "invalid file name"))?;

        if DocumentKind::from_path(Path::new(&file_name)).is_none() {
            return Err(AppError::unreadable(
                &file_name,
                "unsupported file type (expected .txt or .pdf)",
            ));
        }

        let dir = self.index.evidence_dir();
        fs::create_dir_all(dir)?;
        fs::write(dir.join(&file_name), bytes)?;
        tracing::info!("Stored evidence file {} ({} bytes)", file_name, bytes.len());

        let rebuild = self.index.rebuild()?;
        Ok(UploadReport { file_name, rebuild })
    }

    pub fn rebuild(&self) -> AppResult<RebuildStats> {
        self.index.rebuild()
    }

    /// Answer a question for `username`.
    ///
    /// The question is charged before the completion call and refunded if
    /// composing fails. A denied quota surfaces as `DailyLimitReached`.
    pub async fn ask(&self, username: &str, question: &str) -> AppResult<AskOutcome> {
        let ticket = self.quota.check_and_increment(username)?.into_result()?;

        let chunks = self.retriever.retrieve(question);
        tracing::debug!("Retrieved {} chunks for {}", chunks.len(), username);

        let composed = match self.composer.compose(question, &chunks).await {
            Ok(composed) => composed,
            Err(e) => {
                if let Err(refund_err) = self.quota.refund(&ticket) {
                    tracing::warn!("Failed to refund quota for {}: {}", username, refund_err);
                }
                return Err(e);
            }
        };

        let record = ChatRecord {
            username: username.to_string(),
            question: question.to_string(),
            answer: composed.answer.clone(),
            asked_at: Utc::now(),
        };
        if let Err(e) = self.history.append_chat(&record, self.config.history_limit) {
            tracing::warn!("Failed to record chat history: {}", e);
        }

        tracing::info!(
            "Answered question for {} citing {} sources",
            username,
            composed.citations.len()
        );

        Ok(AskOutcome {
            answer: composed.answer,
            citations: composed.citations,
            chunks,
        })
    }

    pub fn quota_status(&self, username: &str) -> AppResult<QuotaStatus> {
        self.quota.status(username)
    }

    /// The user's most recent chats, oldest first.
    pub fn history(&self, username: &str) -> AppResult<Vec<ChatRecord>> {
        self.history.recent_chats(username)
    }

    pub fn clear_history(&self, username: &str) -> AppResult<usize> {
        self.history.clear_chats(username)
    }

    /// Index statistics, loading the index first if needed.
    pub fn index_stats(&self) -> AppResult<IndexStats> {
        self.index.load()?;
        Ok(self.index.stats())
    }
}

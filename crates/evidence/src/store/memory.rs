//! In-process store.

use super::{HistoryStore, IndexSnapshot, QuotaSnapshot, QuotaStore, SnapshotStore};
use crate::types::ChatRecord;
use chrono::{DateTime, Utc};
use coldcase_core::AppResult;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct MemoryState {
    chats: HashMap<String, VecDeque<ChatRecord>>,
    quota: Option<QuotaSnapshot>,
    snapshot: Option<IndexSnapshot>,
}

/// Keeps everything in memory; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HistoryStore for MemoryStore {
    fn append_chat(&self, record: &ChatRecord, keep: usize) -> AppResult<()> {
        let mut state = self.lock();
        let chats = state.chats.entry(record.username.clone()).or_default();
        chats.push_back(record.clone());
        while chats.len() > keep {
            chats.pop_front();
        }
        Ok(())
    }

    fn recent_chats(&self, username: &str) -> AppResult<Vec<ChatRecord>> {
        Ok(self
            .lock()
            .chats
            .get(username)
            .map(|c| c.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn clear_chats(&self, username: &str) -> AppResult<usize> {
        Ok(self
            .lock()
            .chats
            .remove(username)
            .map(|c| c.len())
            .unwrap_or(0))
    }
}

impl QuotaStore for MemoryStore {
    fn load_quota(&self) -> AppResult<Option<QuotaSnapshot>> {
        Ok(self.lock().quota.clone())
    }

    fn save_usage(&self, username: &str, used: u32) -> AppResult<()> {
        let mut state = self.lock();
        let quota = state.quota.get_or_insert_with(|| QuotaSnapshot {
            reset_at: Utc::now(),
            used: HashMap::new(),
        });
        quota.used.insert(username.to_string(), used);
        Ok(())
    }

    fn reset_window(&self, reset_at: DateTime<Utc>) -> AppResult<()> {
        self.lock().quota = Some(QuotaSnapshot {
            reset_at,
            used: HashMap::new(),
        });
        Ok(())
    }
}

impl SnapshotStore for MemoryStore {
    fn save_snapshot(&self, snapshot: &IndexSnapshot) -> AppResult<()> {
        self.lock().snapshot = Some(snapshot.clone());
        Ok(())
    }

    fn load_snapshot(&self) -> AppResult<Option<IndexSnapshot>> {
        Ok(self.lock().snapshot.clone())
    }
}

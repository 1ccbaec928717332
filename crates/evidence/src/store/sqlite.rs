//! SQLite-backed store.

use super::{HistoryStore, IndexSnapshot, QuotaSnapshot, QuotaStore, SnapshotStore};
use crate::types::{ChatRecord, Document};
use chrono::{DateTime, Utc};
use coldcase_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    question TEXT NOT NULL,
    answer TEXT NOT NULL,
    asked_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chats_username ON chats(username);

CREATE TABLE IF NOT EXISTS quota_usage (
    username TEXT PRIMARY KEY,
    used INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS quota_window (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    reset_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS snapshot_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    fingerprint TEXT NOT NULL,
    built_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS snapshot_documents (
    position INTEGER PRIMARY KEY,
    source_name TEXT NOT NULL,
    full_text TEXT NOT NULL
);
"#;

/// Store backed by a single SQLite database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and ensure the schema exists.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Storage(format!("Failed to create database directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Storage(format!("Failed to open SQLite database: {}", e)))?;
        let store = Self::init(conn)?;
        tracing::debug!("Opened SQLite store at {:?}", db_path);
        Ok(store)
    }

    /// In-memory database, mostly for tests.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Storage(format!("Failed to open SQLite database: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| AppError::Storage(format!("Failed to create tables: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

impl HistoryStore for SqliteStore {
    fn append_chat(&self, record: &ChatRecord, keep: usize) -> AppResult<()> {
        let mut conn = self.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Storage(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            "INSERT INTO chats (username, question, answer, asked_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.username,
                record.question,
                record.answer,
                record.asked_at.to_rfc3339(),
            ],
        )
        .map_err(|e| AppError::Storage(format!("Failed to insert chat: {}", e)))?;

        tx.execute(
            "DELETE FROM chats WHERE username = ?1 AND id NOT IN (
                 SELECT id FROM chats WHERE username = ?1 ORDER BY id DESC LIMIT ?2
             )",
            params![record.username, keep as i64],
        )
        .map_err(|e| AppError::Storage(format!("Failed to prune chats: {}", e)))?;

        tx.commit()
            .map_err(|e| AppError::Storage(format!("Failed to commit chat: {}", e)))?;
        Ok(())
    }

    fn recent_chats(&self, username: &str) -> AppResult<Vec<ChatRecord>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT username, question, answer, asked_at FROM chats
                 WHERE username = ?1 ORDER BY id ASC",
            )
            .map_err(|e| AppError::Storage(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![username], |row| {
                let asked_at: String = row.get(3)?;
                Ok(ChatRecord {
                    username: row.get(0)?,
                    question: row.get(1)?,
                    answer: row.get(2)?,
                    asked_at: parse_timestamp(3, &asked_at)?,
                })
            })
            .map_err(|e| AppError::Storage(format!("Failed to query chats: {}", e)))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| AppError::Storage(format!("Failed to read chat row: {}", e)))
    }

    fn clear_chats(&self, username: &str) -> AppResult<usize> {
        self.lock()
            .execute("DELETE FROM chats WHERE username = ?1", params![username])
            .map_err(|e| AppError::Storage(format!("Failed to clear chats: {}", e)))
    }
}

impl QuotaStore for SqliteStore {
    fn load_quota(&self) -> AppResult<Option<QuotaSnapshot>> {
        let conn = self.lock();

        let reset_at: Option<String> = conn
            .query_row("SELECT reset_at FROM quota_window WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| AppError::Storage(format!("Failed to read quota window: {}", e)))?;

        let Some(reset_at) = reset_at else {
            return Ok(None);
        };
        let reset_at = parse_timestamp(0, &reset_at)
            .map_err(|e| AppError::Storage(format!("Corrupt quota window: {}", e)))?;

        let mut stmt = conn
            .prepare("SELECT username, used FROM quota_usage")
            .map_err(|e| AppError::Storage(format!("Failed to prepare query: {}", e)))?;
        let used = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?)))
            .map_err(|e| AppError::Storage(format!("Failed to query quota usage: {}", e)))?
            .collect::<rusqlite::Result<HashMap<_, _>>>()
            .map_err(|e| AppError::Storage(format!("Failed to read quota row: {}", e)))?;

        Ok(Some(QuotaSnapshot { reset_at, used }))
    }

    fn save_usage(&self, username: &str, used: u32) -> AppResult<()> {
        self.lock()
            .execute(
                "INSERT INTO quota_usage (username, used) VALUES (?1, ?2)
                 ON CONFLICT(username) DO UPDATE SET used = excluded.used",
                params![username, used],
            )
            .map_err(|e| AppError::Storage(format!("Failed to save quota usage: {}", e)))?;
        Ok(())
    }

    fn reset_window(&self, reset_at: DateTime<Utc>) -> AppResult<()> {
        let mut conn = self.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Storage(format!("Failed to begin transaction: {}", e)))?;

        tx.execute("DELETE FROM quota_usage", [])
            .map_err(|e| AppError::Storage(format!("Failed to reset quota usage: {}", e)))?;
        tx.execute(
            "INSERT OR REPLACE INTO quota_window (id, reset_at) VALUES (1, ?1)",
            params![reset_at.to_rfc3339()],
        )
        .map_err(|e| AppError::Storage(format!("Failed to save quota window: {}", e)))?;

        tx.commit()
            .map_err(|e| AppError::Storage(format!("Failed to commit quota reset: {}", e)))?;
        Ok(())
    }
}

impl SnapshotStore for SqliteStore {
    fn save_snapshot(&self, snapshot: &IndexSnapshot) -> AppResult<()> {
        let mut conn = self.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Storage(format!("Failed to begin transaction: {}", e)))?;

        tx.execute("DELETE FROM snapshot_documents", [])
            .map_err(|e| AppError::Storage(format!("Failed to clear snapshot: {}", e)))?;
        tx.execute(
            "INSERT OR REPLACE INTO snapshot_meta (id, fingerprint, built_at) VALUES (1, ?1, ?2)",
            params![snapshot.fingerprint, snapshot.built_at.to_rfc3339()],
        )
        .map_err(|e| AppError::Storage(format!("Failed to save snapshot meta: {}", e)))?;

        for (position, doc) in snapshot.documents.iter().enumerate() {
            tx.execute(
                "INSERT INTO snapshot_documents (position, source_name, full_text)
                 VALUES (?1, ?2, ?3)",
                params![position as i64, doc.source_name, doc.full_text],
            )
            .map_err(|e| AppError::Storage(format!("Failed to save snapshot document: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::Storage(format!("Failed to commit snapshot: {}", e)))?;

        tracing::debug!(
            "Saved index snapshot with {} documents",
            snapshot.documents.len()
        );
        Ok(())
    }

    fn load_snapshot(&self) -> AppResult<Option<IndexSnapshot>> {
        let conn = self.lock();

        let meta: Option<(String, String)> = conn
            .query_row(
                "SELECT fingerprint, built_at FROM snapshot_meta WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| AppError::Storage(format!("Failed to read snapshot meta: {}", e)))?;

        let Some((fingerprint, built_at)) = meta else {
            return Ok(None);
        };
        let built_at = parse_timestamp(1, &built_at)
            .map_err(|e| AppError::Storage(format!("Corrupt snapshot timestamp: {}", e)))?;

        let mut stmt = conn
            .prepare("SELECT source_name, full_text FROM snapshot_documents ORDER BY position")
            .map_err(|e| AppError::Storage(format!("Failed to prepare query: {}", e)))?;
        let documents = stmt
            .query_map([], |row| {
                Ok(Document {
                    source_name: row.get(0)?,
                    full_text: row.get(1)?,
                })
            })
            .map_err(|e| AppError::Storage(format!("Failed to query snapshot: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| AppError::Storage(format!("Failed to read snapshot row: {}", e)))?;

        Ok(Some(IndexSnapshot {
            fingerprint,
            built_at,
            documents,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn chat(user: &str, n: usize) -> ChatRecord {
        ChatRecord {
            username: user.to_string(),
            question: format!("question {}", n),
            answer: format!("answer {}", n),
            asked_at: Utc::now(),
        }
    }

    #[test]
    fn test_history_retention_per_user() {
        let store = SqliteStore::open_in_memory().unwrap();
        for n in 0..7 {
            store.append_chat(&chat("ada", n), 5).unwrap();
        }
        store.append_chat(&chat("bob", 0), 5).unwrap();

        let history = store.recent_chats("ada").unwrap();
        let questions: Vec<&str> = history.iter().map(|c| c.question.as_str()).collect();
        assert_eq!(
            questions,
            vec!["question 2", "question 3", "question 4", "question 5", "question 6"]
        );
        assert_eq!(store.recent_chats("bob").unwrap().len(), 1);

        assert_eq!(store.clear_chats("ada").unwrap(), 5);
        assert!(store.recent_chats("ada").unwrap().is_empty());
    }

    #[test]
    fn test_quota_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join(".coldcase").join("coldcase.sqlite");
        let reset_at = DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        {
            let store = SqliteStore::open(&db_path).unwrap();
            assert!(store.load_quota().unwrap().is_none());
            store.reset_window(reset_at).unwrap();
            store.save_usage("ada", 3).unwrap();
            store.save_usage("ada", 4).unwrap();
        }

        let store = SqliteStore::open(&db_path).unwrap();
        let quota = store.load_quota().unwrap().unwrap();
        assert_eq!(quota.reset_at, reset_at);
        assert_eq!(quota.used.get("ada"), Some(&4));

        store.reset_window(reset_at).unwrap();
        assert!(store.load_quota().unwrap().unwrap().used.is_empty());
    }

    #[test]
    fn test_snapshot_replaces_previous() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.load_snapshot().unwrap().is_none());

        let doc = |name: &str| Document {
            source_name: name.to_string(),
            full_text: format!("text of {}", name),
        };

        store
            .save_snapshot(&IndexSnapshot {
                fingerprint: "old".to_string(),
                built_at: Utc::now(),
                documents: vec![doc("a.txt"), doc("b.txt")],
            })
            .unwrap();
        store
            .save_snapshot(&IndexSnapshot {
                fingerprint: "new".to_string(),
                built_at: Utc::now(),
                documents: vec![doc("c.txt")],
            })
            .unwrap();

        let loaded = store.load_snapshot().unwrap().unwrap();
        assert_eq!(loaded.fingerprint, "new");
        assert_eq!(loaded.documents, vec![doc("c.txt")]);
    }
}

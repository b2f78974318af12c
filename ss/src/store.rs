//! Core checkpoint store implementation

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use tracing::debug;

use crate::now_ms;

/// Errors from checkpoint operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Version conflict for '{id}': expected {expected}, found {actual}")]
    VersionConflict { id: String, expected: u64, actual: u64 },
}

/// A persisted session snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    /// Session id the snapshot belongs to
    pub id: String,
    /// Monotonic version, starts at 1 on first write
    pub version: u64,
    /// Opaque JSON payload; callers own the schema
    pub payload: String,
    /// Last write timestamp (Unix ms)
    pub updated_at: i64,
}

/// Listing entry without the payload
#[derive(Debug, Clone)]
pub struct CheckpointSummary {
    pub id: String,
    pub version: u64,
    pub updated_at: i64,
}

/// Latest-snapshot storage keyed by session id.
///
/// `put_latest` performs a compare-and-set on the stored version: a write
/// with a stale `expected_version` fails with `VersionConflict` instead of
/// clobbering a concurrent turn's result.
pub trait CheckpointStore: Send {
    /// Fetch the latest checkpoint, or None if the id has never been written
    fn get_latest(&mut self, id: &str) -> Result<Option<Checkpoint>, StoreError>;

    /// Write a new latest checkpoint; `expected_version` must match the
    /// stored version (0 for a first write). Returns the new version.
    fn put_latest(&mut self, id: &str, expected_version: u64, payload: &str) -> Result<u64, StoreError>;

    /// List all stored sessions, most recently updated first
    fn list(&mut self) -> Result<Vec<CheckpointSummary>, StoreError>;
}

/// SQLite-backed store, one row per session id
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create a store under the given directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let db_path = dir.join("sessions.db");
        debug!(db_path = %db_path.display(), "SqliteStore::open: called");

        let conn = Connection::open(&db_path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                id         TEXT PRIMARY KEY,
                version    INTEGER NOT NULL,
                payload    TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )?;

        Ok(Self { conn })
    }

    fn current_version(&self, id: &str) -> Result<Option<u64>, StoreError> {
        let version = self
            .conn
            .query_row("SELECT version FROM checkpoints WHERE id = ?1", params![id], |row| {
                row.get::<_, i64>(0)
            })
            .optional()?;
        Ok(version.map(|v| v as u64))
    }
}

impl CheckpointStore for SqliteStore {
    fn get_latest(&mut self, id: &str) -> Result<Option<Checkpoint>, StoreError> {
        debug!(%id, "SqliteStore::get_latest: called");
        let checkpoint = self
            .conn
            .query_row(
                "SELECT id, version, payload, updated_at FROM checkpoints WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Checkpoint {
                        id: row.get(0)?,
                        version: row.get::<_, i64>(1)? as u64,
                        payload: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(checkpoint)
    }

    fn put_latest(&mut self, id: &str, expected_version: u64, payload: &str) -> Result<u64, StoreError> {
        debug!(%id, expected_version, "SqliteStore::put_latest: called");
        let now = now_ms();

        match self.current_version(id)? {
            None => {
                if expected_version != 0 {
                    return Err(StoreError::VersionConflict {
                        id: id.to_string(),
                        expected: expected_version,
                        actual: 0,
                    });
                }
                self.conn.execute(
                    "INSERT INTO checkpoints (id, version, payload, updated_at) VALUES (?1, 1, ?2, ?3)",
                    params![id, payload, now],
                )?;
                Ok(1)
            }
            Some(actual) => {
                if actual != expected_version {
                    return Err(StoreError::VersionConflict {
                        id: id.to_string(),
                        expected: expected_version,
                        actual,
                    });
                }
                let next = actual + 1;
                self.conn.execute(
                    "UPDATE checkpoints SET version = ?1, payload = ?2, updated_at = ?3 WHERE id = ?4 AND version = ?5",
                    params![next as i64, payload, now, id, actual as i64],
                )?;
                Ok(next)
            }
        }
    }

    fn list(&mut self) -> Result<Vec<CheckpointSummary>, StoreError> {
        debug!("SqliteStore::list: called");
        let mut stmt = self
            .conn
            .prepare("SELECT id, version, updated_at FROM checkpoints ORDER BY updated_at DESC")?;
        let rows = stmt.query_map([], |row| {
            Ok(CheckpointSummary {
                id: row.get(0)?,
                version: row.get::<_, i64>(1)? as u64,
                updated_at: row.get(2)?,
            })
        })?;
        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }
        Ok(summaries)
    }
}

/// In-memory store for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryStore {
    checkpoints: HashMap<String, Checkpoint>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryStore {
    fn get_latest(&mut self, id: &str) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self.checkpoints.get(id).cloned())
    }

    fn put_latest(&mut self, id: &str, expected_version: u64, payload: &str) -> Result<u64, StoreError> {
        let actual = self.checkpoints.get(id).map(|c| c.version).unwrap_or(0);
        if actual != expected_version {
            return Err(StoreError::VersionConflict {
                id: id.to_string(),
                expected: expected_version,
                actual,
            });
        }
        let next = actual + 1;
        self.checkpoints.insert(
            id.to_string(),
            Checkpoint {
                id: id.to_string(),
                version: next,
                payload: payload.to_string(),
                updated_at: now_ms(),
            },
        );
        Ok(next)
    }

    fn list(&mut self) -> Result<Vec<CheckpointSummary>, StoreError> {
        let mut summaries: Vec<CheckpointSummary> = self
            .checkpoints
            .values()
            .map(|c| CheckpointSummary {
                id: c.id.clone(),
                version: c.version,
                updated_at: c.updated_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn roundtrip(store: &mut dyn CheckpointStore) {
        assert!(store.get_latest("s-1").unwrap().is_none());

        let v1 = store.put_latest("s-1", 0, r#"{"phase":"why"}"#).unwrap();
        assert_eq!(v1, 1);

        let cp = store.get_latest("s-1").unwrap().unwrap();
        assert_eq!(cp.version, 1);
        assert_eq!(cp.payload, r#"{"phase":"why"}"#);

        let v2 = store.put_latest("s-1", 1, r#"{"phase":"how"}"#).unwrap();
        assert_eq!(v2, 2);
        assert_eq!(store.get_latest("s-1").unwrap().unwrap().payload, r#"{"phase":"how"}"#);
    }

    #[test]
    fn test_sqlite_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut store = SqliteStore::open(dir.path()).unwrap();
        roundtrip(&mut store);
    }

    #[test]
    fn test_memory_roundtrip() {
        let mut store = MemoryStore::new();
        roundtrip(&mut store);
    }

    #[test]
    fn test_version_conflict_on_stale_write() {
        let mut store = MemoryStore::new();
        store.put_latest("s-1", 0, "a").unwrap();
        store.put_latest("s-1", 1, "b").unwrap();

        // A writer still holding version 1 must be rejected
        let err = store.put_latest("s-1", 1, "c").unwrap_err();
        match err {
            StoreError::VersionConflict { expected, actual, .. } => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("Expected VersionConflict, got {:?}", other),
        }

        // The stale write left the stored payload untouched
        assert_eq!(store.get_latest("s-1").unwrap().unwrap().payload, "b");
    }

    #[test]
    fn test_first_write_requires_version_zero() {
        let dir = TempDir::new().unwrap();
        let mut store = SqliteStore::open(dir.path()).unwrap();

        let err = store.put_latest("fresh", 3, "x").unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { actual: 0, .. }));
    }

    #[test]
    fn test_list_returns_all_sessions() {
        let dir = TempDir::new().unwrap();
        let mut store = SqliteStore::open(dir.path()).unwrap();
        store.put_latest("old", 0, "a").unwrap();
        store.put_latest("new", 0, "b").unwrap();
        store.put_latest("new", 1, "c").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        let new = listed.iter().find(|s| s.id == "new").unwrap();
        assert_eq!(new.version, 2);
    }

    #[test]
    fn test_sqlite_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = SqliteStore::open(dir.path()).unwrap();
            store.put_latest("s-1", 0, "persisted").unwrap();
        }
        let mut store = SqliteStore::open(dir.path()).unwrap();
        let cp = store.get_latest("s-1").unwrap().unwrap();
        assert_eq!(cp.payload, "persisted");
        assert_eq!(cp.version, 1);
    }
}

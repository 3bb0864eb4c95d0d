//! SQLite-backed document store
//!
//! Documents live in a single `documents` table keyed by `(collection, id)`,
//! with the JSON body in `data` and a per-row `version` used for conflict
//! detection at commit time.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};

use super::{
    stage_writes, CommitStatus, DocRef, DocumentStore, ReadSet, RetryPolicy, Snapshot, StoreError,
    WriteOp,
};
use crate::config::StoreSettings;

const SCHEMA_VERSION: i32 = 1;

/// Document store on top of a single SQLite connection
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    policy: RetryPolicy,
}

impl SqliteStore {
    /// Open or create the store at `path` with default settings
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::open_with_settings(path, &StoreSettings::default())
    }

    /// Open or create the store at `path`
    pub fn open_with_settings(path: &Path, settings: &StoreSettings) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        // WAL so separate processes can read while one writes
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(Duration::from_millis(settings.busy_timeout_ms))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            policy: RetryPolicy::from(settings),
        };
        store.init_schema()?;
        tracing::debug!(path = %path.display(), "opened progress store");
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA_SQL)?;

        let version: i32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )?;
        if version < SCHEMA_VERSION {
            conn.execute(
                "INSERT OR REPLACE INTO schema_version VALUES (?1)",
                [SCHEMA_VERSION],
            )?;
        }
        Ok(())
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            [collection],
            |r| r.get(0),
        )?;
        Ok(count as u64)
    }
}

fn load_row(conn: &Connection, doc: &DocRef) -> Result<Option<Snapshot>, StoreError> {
    let row: Option<(String, i64)> = conn
        .query_row(
            "SELECT data, version FROM documents WHERE collection = ?1 AND id = ?2",
            params![doc.collection, doc.id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;

    row.map(|(raw, version)| {
        let data = serde_json::from_str(&raw).map_err(|source| StoreError::Decode {
            doc: doc.to_string(),
            source,
        })?;
        Ok(Snapshot { data, version })
    })
    .transpose()
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

impl DocumentStore for SqliteStore {
    fn load(&self, doc: &DocRef) -> Result<Option<Snapshot>, StoreError> {
        let conn = self.conn()?;
        load_row(&conn, doc)
    }

    fn commit(
        &self,
        reads: &ReadSet,
        writes: &[WriteOp],
        now: DateTime<Utc>,
    ) -> Result<CommitStatus, StoreError> {
        let mut conn = self.conn()?;
        // Another process holding the write lock past busy_timeout counts as a conflict
        let tx = match conn.transaction_with_behavior(TransactionBehavior::Immediate) {
            Ok(tx) => tx,
            Err(e) if is_busy(&e) => return Ok(CommitStatus::Conflict),
            Err(e) => return Err(e.into()),
        };

        for (doc, seen) in reads {
            let current: Option<i64> = tx
                .query_row(
                    "SELECT version FROM documents WHERE collection = ?1 AND id = ?2",
                    params![doc.collection, doc.id],
                    |r| r.get(0),
                )
                .optional()?;
            if current != *seen {
                // Dropping `tx` rolls back
                return Ok(CommitStatus::Conflict);
            }
        }

        let staged = stage_writes(writes, now, |doc| {
            Ok(load_row(&tx, doc)?.map(|snapshot| snapshot.data))
        })?;

        let updated_at = now.timestamp_millis();
        for (doc, data) in &staged {
            tx.execute(
                r#"INSERT INTO documents (collection, id, data, version, updated_at)
                   VALUES (?1, ?2, ?3, 1, ?4)
                   ON CONFLICT(collection, id) DO UPDATE SET
                       data = excluded.data, version = version + 1, updated_at = excluded.updated_at"#,
                params![doc.collection, doc.id, data.to_string(), updated_at],
            )?;
        }

        match tx.commit() {
            Ok(()) => Ok(CommitStatus::Committed),
            Err(e) if is_busy(&e) => Ok(CommitStatus::Conflict),
            Err(e) => Err(e.into()),
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }
}

/// SQL schema for the document store
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (collection, id)
);

CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);
"#;

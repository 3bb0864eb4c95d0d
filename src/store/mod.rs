//! Transactional document store
//!
//! Progress is persisted as JSON documents addressed by `collection/id`.
//! A [`DocumentStore`] runs transactions optimistically: reads record the
//! version of every document they saw, writes are buffered, and the commit
//! only succeeds if none of the read documents changed in the meantime.
//! On conflict the whole transaction body runs again against fresh state,
//! so bodies must be pure functions of what they read.
//!
//! ```text
//!  run_transaction(work)
//!      │
//!      ├─► work(tx)  ── get() ──► load + record version
//!      │              ── set()/update() ──► buffer
//!      │
//!      └─► commit(reads, writes)
//!             ├─ versions unchanged ──► apply, bump versions, done
//!             └─ conflict ──► backoff, run work again
//! ```

mod document;
mod error;
mod memory;
mod sqlite;

pub use document::{
    apply_write, deep_merge, get_at_path, timestamp_value, DocRef, FieldPath, FieldValue, Fields,
    WriteOp,
};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::StoreSettings;

/// A stored document together with its version counter
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub data: Value,
    pub version: i64,
}

/// Versions observed by a transaction (`None` = document did not exist)
pub type ReadSet = HashMap<DocRef, Option<i64>>;

/// Result of a commit attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStatus {
    Committed,
    Conflict,
}

/// How often and how patiently a conflicting transaction is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(2),
            max_backoff: Duration::from_millis(250),
        }
    }
}

impl From<&StoreSettings> for RetryPolicy {
    fn from(settings: &StoreSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            ..Self::default()
        }
    }
}

/// Backend for transactional document storage
pub trait DocumentStore: Send + Sync {
    /// Load the current state of a document
    fn load(&self, doc: &DocRef) -> Result<Option<Snapshot>, StoreError>;

    /// Atomically validate `reads` and apply `writes`.
    ///
    /// Returns [`CommitStatus::Conflict`] without applying anything if any
    /// document in `reads` no longer has the recorded version.
    fn commit(
        &self,
        reads: &ReadSet,
        writes: &[WriteOp],
        now: DateTime<Utc>,
    ) -> Result<CommitStatus, StoreError>;

    fn retry_policy(&self) -> RetryPolicy;

    /// Non-transactional read of a single document
    fn get(&self, doc: &DocRef) -> Result<Option<Value>, StoreError> {
        Ok(self.load(doc)?.map(|snapshot| snapshot.data))
    }

    /// Run `work` inside a transaction, retrying on conflict.
    ///
    /// Errors returned by `work` abort the transaction without retrying.
    /// A body that buffers no writes commits nothing.
    fn run_transaction<T, F>(&self, mut work: F) -> Result<T, StoreError>
    where
        Self: Sized,
        F: FnMut(&mut Transaction<'_, Self>) -> Result<T, StoreError>,
    {
        let policy = self.retry_policy();
        let max_attempts = policy.max_attempts.max(1);
        let mut backoff = policy.initial_backoff;

        for attempt in 1..=max_attempts {
            let mut tx = Transaction::new(self);
            let result = work(&mut tx)?;
            if tx.writes.is_empty() {
                return Ok(result);
            }

            match self.commit(&tx.reads, &tx.writes, Utc::now())? {
                CommitStatus::Committed => return Ok(result),
                CommitStatus::Conflict => {
                    tracing::debug!(attempt, max_attempts, "transaction conflict, retrying");
                    if attempt < max_attempts {
                        std::thread::sleep(backoff);
                        backoff = (backoff * 2).min(policy.max_backoff);
                    }
                }
            }
        }

        tracing::warn!(max_attempts, "transaction gave up after repeated conflicts");
        Err(StoreError::Contention {
            attempts: max_attempts,
        })
    }
}

/// Handle passed to transaction bodies
pub struct Transaction<'s, S: DocumentStore> {
    store: &'s S,
    started_at: DateTime<Utc>,
    snapshots: HashMap<DocRef, Option<Value>>,
    reads: ReadSet,
    writes: Vec<WriteOp>,
}

impl<'s, S: DocumentStore> Transaction<'s, S> {
    fn new(store: &'s S) -> Self {
        Self {
            store,
            started_at: Utc::now(),
            snapshots: HashMap::new(),
            reads: ReadSet::new(),
            writes: Vec::new(),
        }
    }

    /// Read a document, including writes already buffered in this transaction.
    pub fn get(&mut self, doc: &DocRef) -> Result<Option<Value>, StoreError> {
        if !self.snapshots.contains_key(doc) {
            let snapshot = self.store.load(doc)?;
            self.reads
                .insert(doc.clone(), snapshot.as_ref().map(|s| s.version));
            self.snapshots
                .insert(doc.clone(), snapshot.map(|s| s.data));
        }

        let mut current = self.snapshots.get(doc).cloned().flatten();
        for op in self.writes.iter().filter(|op| op.doc() == doc) {
            current = Some(apply_write(current, op, self.started_at)?);
        }
        Ok(current)
    }

    /// Read and decode a document
    pub fn get_as<T: DeserializeOwned>(&mut self, doc: &DocRef) -> Result<Option<T>, StoreError> {
        self.get(doc)?
            .map(|value| decode(doc, value))
            .transpose()
    }

    /// Read and decode a document, treating a missing one as `T::default()`
    pub fn get_or_default<T: DeserializeOwned + Default>(
        &mut self,
        doc: &DocRef,
    ) -> Result<T, StoreError> {
        Ok(self.get_as(doc)?.unwrap_or_default())
    }

    /// Write `fields`; with `merge` the existing document is kept and merged into.
    pub fn set(&mut self, doc: &DocRef, fields: Fields, merge: bool) {
        self.writes.push(WriteOp::Set {
            doc: doc.clone(),
            fields,
            merge,
        });
    }

    /// Assign `fields` on an existing document. Fails at commit if it is missing.
    pub fn update(&mut self, doc: &DocRef, fields: Fields) {
        self.writes.push(WriteOp::Update {
            doc: doc.clone(),
            fields,
        });
    }
}

/// Decode a JSON document into a typed value
pub fn decode<T: DeserializeOwned>(doc: &DocRef, value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|source| StoreError::Decode {
        doc: doc.to_string(),
        source,
    })
}

/// Apply `writes` on top of the documents returned by `load`, grouped per document.
///
/// Shared by the backends: they call this while holding their commit lock.
pub(crate) fn stage_writes<L>(
    writes: &[WriteOp],
    now: DateTime<Utc>,
    mut load: L,
) -> Result<Vec<(DocRef, Value)>, StoreError>
where
    L: FnMut(&DocRef) -> Result<Option<Value>, StoreError>,
{
    let mut staged: Vec<(DocRef, Value)> = Vec::new();
    for op in writes {
        let doc = op.doc();
        let current = match staged.iter().position(|(d, _)| d == doc) {
            Some(idx) => Some(staged.remove(idx).1),
            None => load(doc)?,
        };
        let next = apply_write(current, op, now)?;
        staged.push((doc.clone(), next));
    }
    Ok(staged)
}

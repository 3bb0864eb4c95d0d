//! In-memory document store

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::{
    stage_writes, CommitStatus, DocRef, DocumentStore, ReadSet, RetryPolicy, Snapshot, StoreError,
    WriteOp,
};

/// Document store backed by a shared `HashMap`.
///
/// Cloning is cheap and clones share the same documents.
#[derive(Clone, Default)]
pub struct MemoryStore {
    docs: Arc<Mutex<HashMap<DocRef, Snapshot>>>,
    policy: RetryPolicy,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retry_policy(policy: RetryPolicy) -> Self {
        Self {
            docs: Arc::default(),
            policy,
        }
    }

    fn docs(&self) -> Result<MutexGuard<'_, HashMap<DocRef, Snapshot>>, StoreError> {
        self.docs.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.docs().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self, doc: &DocRef) -> Result<Option<Snapshot>, StoreError> {
        Ok(self.docs()?.get(doc).cloned())
    }

    fn commit(
        &self,
        reads: &ReadSet,
        writes: &[WriteOp],
        now: DateTime<Utc>,
    ) -> Result<CommitStatus, StoreError> {
        let mut docs = self.docs()?;

        for (doc, seen) in reads {
            if docs.get(doc).map(|s| s.version) != *seen {
                return Ok(CommitStatus::Conflict);
            }
        }

        let staged = stage_writes(writes, now, |doc| {
            Ok(docs.get(doc).map(|s| s.data.clone()))
        })?;

        for (doc, data) in staged {
            let version = docs.get(&doc).map_or(1, |s| s.version + 1);
            docs.insert(doc, Snapshot { data, version });
        }
        Ok(CommitStatus::Committed)
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }
}

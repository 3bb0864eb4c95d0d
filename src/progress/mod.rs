//! Progress tracking: XP ledger, levels and user records
//!
//! # Usage
//!
//! ```ignore
//! let manager = ProgressManager::new()?;
//!
//! // Apply a quiz score
//! manager.ledger().record_quiz_result("u1", "q1", 80)?;
//!
//! // Read it back
//! let xp = manager.ledger().get_user_xp("u1")?;
//! let level = calculate_level(xp.xp);
//! ```

mod ledger;
mod levels;
mod models;
mod users;

pub use ledger::ProgressLedger;
pub use levels::{award_xp, calculate_level, LevelCurve, LevelStats, XpAward};
pub use models::{
    user_progress_ref, user_ref, ChallengeRecord, ChallengeResult, ChallengeType, ProgressStats,
    ProgressUpdate, RecordOutcome, UserProgress, UserXp, USERS_COLLECTION,
    USER_PROGRESS_COLLECTION,
};
pub use users::ensure_user;

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::{Config, StoreSettings};
use crate::store::{DocumentStore, MemoryStore, SqliteStore};

/// Central manager for progress tracking
///
/// Owns the document store and hands out ledgers that share it.
#[derive(Clone)]
pub struct ProgressManager<S = SqliteStore> {
    store: S,
    curve: LevelCurve,
}

impl ProgressManager<SqliteStore> {
    /// Create a ProgressManager from the global configuration
    pub fn new() -> Result<Self> {
        let config = Config::load(None)?;
        Self::from_config(&config)
    }

    /// Create a ProgressManager using the store and level settings of `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let path = config.database_path();
        let store = SqliteStore::open_with_settings(&path, &config.store)
            .with_context(|| format!("Failed to open progress db: {}", path.display()))?;
        Ok(Self::with_store(store, config.levels))
    }

    /// Create a ProgressManager with a custom database path
    pub fn with_path(path: &Path) -> Result<Self> {
        let store = SqliteStore::open_with_settings(path, &StoreSettings::default())
            .with_context(|| format!("Failed to open progress db: {}", path.display()))?;
        Ok(Self::with_store(store, LevelCurve::default()))
    }
}

impl ProgressManager<MemoryStore> {
    /// Manager over a fresh in-memory store
    pub fn in_memory() -> Self {
        Self::with_store(MemoryStore::new(), LevelCurve::default())
    }
}

impl<S: DocumentStore + Clone> ProgressManager<S> {
    pub fn with_store(store: S, curve: LevelCurve) -> Self {
        Self { store, curve }
    }

    /// Get a ledger for recording results and reading XP
    pub fn ledger(&self) -> ProgressLedger<S> {
        ProgressLedger::new(self.store.clone(), self.curve)
    }

    /// Level curve used by this manager's ledgers
    pub fn curve(&self) -> LevelCurve {
        self.curve
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create a user record if missing (see [`ensure_user`])
    pub fn ensure_user(&self, user_id: &str, display_name: Option<&str>) -> Result<bool> {
        ensure_user(&self.store, user_id, display_name)
            .with_context(|| format!("Failed to create user {user_id}"))
    }
}

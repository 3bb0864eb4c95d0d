//! Shared test utilities for ledger integration tests

use tempfile::TempDir;

use xpledger::{LevelCurve, ProgressManager, SqliteStore};
use xpledger::config::StoreSettings;

/// Progress manager over a fresh SQLite file; keep the `TempDir` alive
/// for as long as the manager is used.
pub fn sqlite_manager() -> (TempDir, ProgressManager) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let manager = ProgressManager::with_path(&temp_dir.path().join("progress.db"))
        .expect("Failed to open progress db");
    (temp_dir, manager)
}

/// Same as [`sqlite_manager`] but tolerant of heavy contention
pub fn contended_sqlite_manager() -> (TempDir, ProgressManager) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let settings = StoreSettings {
        max_attempts: 200,
        initial_backoff_ms: 1,
        ..StoreSettings::default()
    };
    let store = SqliteStore::open_with_settings(&temp_dir.path().join("progress.db"), &settings)
        .expect("Failed to open progress db");
    (temp_dir, ProgressManager::with_store(store, LevelCurve::default()))
}

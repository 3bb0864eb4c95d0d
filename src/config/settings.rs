//! Settings configuration types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Document store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Database file. Defaults to `progress.db` in the global config directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// How many times a conflicting transaction is attempted before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay; doubles after every conflict
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// How long SQLite waits on a lock held by another process
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    2
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: None,
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

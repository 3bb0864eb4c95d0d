//! Configuration loading and management

mod io;
mod settings;

pub use settings::StoreSettings;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::progress::LevelCurve;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Document store settings
    #[serde(default)]
    pub store: StoreSettings,

    /// Level curve used for level calculations
    #[serde(default)]
    pub levels: LevelCurve,
}

impl Config {
    /// Database file to open: the configured path, or `progress.db` in the
    /// global config directory
    pub fn database_path(&self) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(|| Self::global_config_dir().join("progress.db"))
    }
}

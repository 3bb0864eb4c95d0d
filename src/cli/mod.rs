//! CLI command implementations

pub mod calc;
pub mod init;
pub mod query;
pub mod record;
pub mod user;

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use xpledger::{Config, ProgressManager};

/// Global options shared by every command
pub struct Context {
    pub db: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub json: bool,
}

impl Context {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(db) = &self.db {
            config.store.path = Some(db.clone());
        }
        Ok(config)
    }

    pub fn manager(&self) -> Result<ProgressManager> {
        ProgressManager::from_config(&self.load_config()?)
    }

    /// Print `value` as pretty JSON when `--json` is set, otherwise run `human`
    pub fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce(&T)) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human(value);
        }
        Ok(())
    }
}

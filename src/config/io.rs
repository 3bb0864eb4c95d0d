//! Configuration file I/O operations
//!
//! Readers and writers of one config file coordinate through an advisory
//! lock on a sibling `<name>.toml.lock` file. The config itself is only ever
//! replaced by rename, so the lock never has to cover the config's inode.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

use super::Config;

/// Advisory lock held for the duration of a config read or write
struct ConfigLock {
    file: File,
}

impl ConfigLock {
    fn path_for(config_path: &Path) -> PathBuf {
        config_path.with_extension("toml.lock")
    }

    /// Block until no reader or writer holds the lock. Creates the lock file.
    fn exclusive(config_path: &Path) -> Result<Self> {
        let lock_path = Self::path_for(config_path);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to create lock file: {}", lock_path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("Failed to acquire config lock: {}", lock_path.display()))?;
        Ok(Self { file })
    }

    /// Block until no writer holds the lock. `None` when nothing has ever
    /// been saved through [`Config::save_to_file`], so there is no writer to wait for.
    fn shared(config_path: &Path) -> Result<Option<Self>> {
        let lock_path = Self::path_for(config_path);
        let file = match File::open(&lock_path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Failed to open lock file: {}", lock_path.display())
                });
            }
        };
        file.lock_shared()
            .with_context(|| format!("Failed to acquire config lock: {}", lock_path.display()))?;
        Ok(Some(Self { file }))
    }
}

impl Drop for ConfigLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Write `content` next to `path` and rename it into place
fn replace_file(path: &Path, content: &str) -> Result<()> {
    let temp_path = path.with_extension("toml.tmp");
    let mut temp_file = File::create(&temp_path)
        .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;
    temp_file
        .write_all(content.as_bytes())
        .and_then(|()| temp_file.sync_all())
        .with_context(|| format!("Failed to write temp file: {}", temp_path.display()))?;

    std::fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename config file: {}", path.display()))
}

impl Config {
    /// Get the global config directory path (~/.xpledger/)
    pub fn global_config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".xpledger")
    }

    /// Get the global config file path (~/.xpledger/config.toml)
    pub fn global_config_path() -> PathBuf {
        Self::global_config_dir().join("config.toml")
    }

    /// Parse a config file without taking the lock
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load `path` (or the global config file when `None`).
    /// A missing file yields the defaults; a broken one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::global_config_path);

        let _lock = ConfigLock::shared(&path)?;
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    /// Save to `path`, creating parent directories as needed.
    ///
    /// Returns `false` without touching the file when it already exists and
    /// `overwrite` is not set. The existence check and the write happen under
    /// the same exclusive lock.
    pub fn save_to_file(&self, path: &Path, overwrite: bool) -> Result<bool> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let _lock = ConfigLock::exclusive(path)?;
        if !overwrite && path.exists() {
            tracing::debug!(path = %path.display(), "config exists, not overwriting");
            return Ok(false);
        }
        replace_file(path, &content)?;
        Ok(true)
    }
}

//! Init command implementation

use anyhow::{bail, Result};
use tracing::info;

use xpledger::Config;

use super::Context;

/// Write the default configuration to the config path
pub fn init_command(ctx: &Context, force: bool) -> Result<()> {
    let path = ctx
        .config
        .clone()
        .unwrap_or_else(Config::global_config_path);

    let mut config = Config::default();
    config.store.path = ctx.db.clone();
    if !config.save_to_file(&path, force)? {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            path.display()
        );
    }

    info!(path = %path.display(), "wrote config");
    println!("Created {}", path.display());
    println!("Progress database: {}", config.database_path().display());
    Ok(())
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "xpledger")]
#[command(about = "XP ledger and level calculator for quiz and challenge progress")]
#[command(version)]
struct Cli {
    /// Path to the progress database (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Path to the config file (defaults to ~/.xpledger/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a challenge result for a user
    Record {
        #[command(subcommand)]
        kind: cli::record::RecordKind,
    },

    /// Show the XP stored on a user record
    Xp {
        user: String,
    },

    /// Show the level of a user
    Level {
        user: String,
    },

    /// Show a user's full progress record
    Progress {
        user: String,
    },

    /// Manage user records
    User {
        #[command(subcommand)]
        action: cli::user::UserAction,
    },

    /// Level calculations without touching the database
    Calc {
        #[command(subcommand)]
        action: cli::calc::CalcAction,
    },

    /// Write a default config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let ctx = cli::Context {
        db: cli.db,
        config: cli.config,
        json: cli.json,
    };

    match cli.command {
        Commands::Record { kind } => cli::record::record_command(&ctx, kind)?,
        Commands::Xp { user } => cli::query::xp_command(&ctx, &user)?,
        Commands::Level { user } => cli::query::level_command(&ctx, &user)?,
        Commands::Progress { user } => cli::query::progress_command(&ctx, &user)?,
        Commands::User { action } => cli::user::user_command(&ctx, action)?,
        Commands::Calc { action } => cli::calc::calc_command(&ctx, action)?,
        Commands::Init { force } => cli::init::init_command(&ctx, force)?,
    }

    Ok(())
}

//! xpledger - XP ledger for quiz and challenge progress
//!
//! Students earn XP by completing coding problems, debugging exercises and
//! quizzes. xpledger keeps the best score per challenge, the user's total
//! and completion counters consistent in a single transaction, and maps XP
//! totals onto levels.
//!
//! ## Pieces
//!
//! 1. **Ledger** ([`progress::ProgressLedger`]): applies one challenge result
//!    atomically across the progress and user records. Scores never go down.
//!
//! 2. **Levels** ([`progress::calculate_level`], [`progress::award_xp`]):
//!    pure XP to level mapping on a doubling curve.
//!
//! 3. **Store** ([`store::DocumentStore`]): JSON documents with optimistic
//!    transactions, backed by SQLite or memory.

pub mod config;
pub mod progress;
pub mod store;

pub use config::Config;
pub use progress::{
    award_xp, calculate_level, ChallengeType, LevelCurve, LevelStats, ProgressLedger,
    ProgressManager, RecordOutcome, XpAward,
};
pub use store::{DocumentStore, MemoryStore, SqliteStore, StoreError};

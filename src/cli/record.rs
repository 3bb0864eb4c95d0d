//! Record command implementation

use anyhow::Result;
use clap::Subcommand;

use xpledger::RecordOutcome;

use super::Context;

#[derive(Subcommand)]
pub enum RecordKind {
    /// Quiz result (always counts as completed)
    Quiz {
        user: String,
        challenge: String,
        #[arg(long)]
        xp: i64,
    },

    /// Coding problem result
    Problem {
        user: String,
        challenge: String,
        #[arg(long, default_value_t = 0)]
        xp: i64,
        /// Mark the problem as completed
        #[arg(long)]
        completed: bool,
    },

    /// Debugging exercise result
    Debugger {
        user: String,
        challenge: String,
        #[arg(long, default_value_t = 0)]
        xp: i64,
        /// Mark the exercise as completed
        #[arg(long)]
        completed: bool,
    },
}

/// Apply a challenge result and print what changed
pub fn record_command(ctx: &Context, kind: RecordKind) -> Result<()> {
    let manager = ctx.manager()?;
    let ledger = manager.ledger();

    let outcome = match &kind {
        RecordKind::Quiz { user, challenge, xp } => ledger.record_quiz_result(user, challenge, *xp)?,
        RecordKind::Problem {
            user,
            challenge,
            xp,
            completed,
        } => ledger.record_problem_result(user, challenge, *completed, *xp)?,
        RecordKind::Debugger {
            user,
            challenge,
            xp,
            completed,
        } => ledger.record_debugger_result(user, challenge, *completed, *xp)?,
    };

    ctx.emit(&outcome, |outcome| match outcome {
        RecordOutcome::Skipped { recorded_xp } => {
            println!("No change: {} XP already recorded for this challenge.", recorded_xp);
        }
        RecordOutcome::Applied(update) => {
            println!(
                "Recorded {} XP ({} -> {}, +{})",
                update.kind, update.previous_xp, update.new_xp, update.delta
            );
            println!("  Total XP: {}", update.total_xp);
            if update.new_completion {
                println!("  First completion!");
            }
            if update.award.leveled_up {
                println!(
                    "  Level up! Now level {} (+{})",
                    update.award.stats.level, update.award.levels_gained
                );
            }
        }
    })
}

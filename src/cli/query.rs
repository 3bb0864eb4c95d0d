//! Read-only commands: xp, level, progress

use anyhow::Result;

use xpledger::LevelStats;

use super::Context;

pub fn xp_command(ctx: &Context, user: &str) -> Result<()> {
    let xp = ctx.manager()?.ledger().get_user_xp(user)?;
    ctx.emit(&xp, |xp| println!("{}: {} XP", user, xp.xp))
}

pub fn level_command(ctx: &Context, user: &str) -> Result<()> {
    let stats = ctx.manager()?.ledger().get_user_level(user)?;
    ctx.emit(&stats, |stats| {
        println!("{}: level {}", user, stats.level);
        print_level(stats);
    })
}

pub fn progress_command(ctx: &Context, user: &str) -> Result<()> {
    let progress = ctx.manager()?.ledger().get_progress(user)?;
    ctx.emit(&progress, |progress| {
        println!("Progress for {} ({} XP)\n", user, progress.total_xp);
        println!(
            "  Completed: {} problems, {} quizzes, {} debugging exercises",
            progress.stats.challenges_completed,
            progress.stats.quizzes_completed,
            progress.stats.debuggers_completed
        );

        if progress.challenges.is_empty() {
            println!("\n  No challenges recorded.");
            return;
        }

        let mut challenges: Vec<_> = progress.challenges.iter().collect();
        challenges.sort_by(|a, b| a.0.cmp(b.0));
        println!();
        for (id, record) in challenges {
            println!(
                "  {:<24} {:<18} {:>6} XP {}",
                id,
                record.kind,
                record.xp,
                if record.completed { "done" } else { "" }
            );
        }
    })
}

pub(super) fn print_level(stats: &LevelStats) {
    println!(
        "  {} / {} XP into this level ({}%)",
        stats.xp_in_current_level, stats.xp_needed_for_level, stats.progress_percentage
    );
    println!(
        "  {} XP to level {} (at {} XP)",
        stats.xp_to_next_level,
        stats.level + 1,
        stats.xp_for_next_level
    );
}

//! Calc command implementation

use anyhow::Result;
use clap::Subcommand;

use super::query::print_level;
use super::Context;

#[derive(Subcommand)]
pub enum CalcAction {
    /// Level for an XP total
    Level {
        #[arg(allow_negative_numbers = true)]
        xp: i64,
    },

    /// Level change when awarding XP
    Award {
        #[arg(allow_negative_numbers = true)]
        current: i64,
        #[arg(allow_negative_numbers = true)]
        awarded: i64,
    },
}

/// Run a level calculation with the configured curve
pub fn calc_command(ctx: &Context, action: CalcAction) -> Result<()> {
    let curve = ctx.load_config()?.levels;

    match action {
        CalcAction::Level { xp } => {
            let stats = curve.calculate(xp);
            ctx.emit(&stats, |stats| {
                println!("{} XP is level {}", xp, stats.level);
                print_level(stats);
            })
        }
        CalcAction::Award { current, awarded } => {
            let award = curve.award(current, awarded);
            ctx.emit(&award, |award| {
                println!(
                    "{} + {} XP = level {}{}",
                    current,
                    awarded,
                    award.stats.level,
                    if award.leveled_up {
                        format!(" (+{} levels)", award.levels_gained)
                    } else {
                        String::new()
                    }
                );
                print_level(&award.stats);
            })
        }
    }
}

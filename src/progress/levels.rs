//! XP and Level system
//!
//! Levels follow a geometric curve: level 1 starts at 0 XP, level 2 at
//! `base_xp`, and every following level needs `growth_factor` times the
//! previous threshold (100, 200, 400, 800, ... with the defaults).

use serde::{Deserialize, Serialize};

/// Shape of the level curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCurve {
    /// Cumulative XP needed to reach level 2
    #[serde(default = "default_base_xp")]
    pub base_xp: i64,

    /// Multiplier between consecutive level thresholds
    #[serde(default = "default_growth_factor")]
    pub growth_factor: i64,
}

fn default_base_xp() -> i64 {
    100
}

fn default_growth_factor() -> i64 {
    2
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self {
            base_xp: default_base_xp(),
            growth_factor: default_growth_factor(),
        }
    }
}

/// Where a given XP total sits on the level curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelStats {
    pub level: u32,
    #[serde(rename = "currentXP")]
    pub current_xp: i64,
    /// Cumulative XP at the start of the current level
    #[serde(rename = "xpForCurrentLevel")]
    pub xp_for_current_level: i64,
    /// Cumulative XP at which the next level starts
    #[serde(rename = "xpForNextLevel")]
    pub xp_for_next_level: i64,
    #[serde(rename = "xpInCurrentLevel")]
    pub xp_in_current_level: i64,
    #[serde(rename = "xpNeededForLevel")]
    pub xp_needed_for_level: i64,
    /// Floor of the percentage through the current level
    pub progress_percentage: i64,
    #[serde(rename = "xpToNextLevel")]
    pub xp_to_next_level: i64,
}

/// Level stats after an award, plus what changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpAward {
    #[serde(flatten)]
    pub stats: LevelStats,
    #[serde(rename = "xpAwarded")]
    pub xp_awarded: i64,
    pub leveled_up: bool,
    pub levels_gained: u32,
}

impl LevelCurve {
    /// Cumulative XP at which `level` starts. `None` if it does not fit in `i64`.
    pub fn threshold(&self, level: u32) -> Option<i64> {
        match level {
            0 | 1 => Some(0),
            n => self
                .growth_factor
                .checked_pow(n - 2)
                .and_then(|factor| self.base_xp.checked_mul(factor)),
        }
    }

    /// Calculate the level for a given XP total.
    ///
    /// No clamping: negative totals stay on level 1 with a negative
    /// in-level amount.
    pub fn calculate(&self, xp: i64) -> LevelStats {
        let mut level = 1u32;
        let mut xp_for_current_level = 0i64;
        let mut threshold = self.base_xp;

        // A non-growing curve would never terminate
        if self.base_xp > 0 && self.growth_factor > 1 {
            while xp >= threshold {
                level += 1;
                xp_for_current_level = threshold;
                match self.threshold(level + 1) {
                    Some(next) => threshold = next,
                    None => {
                        threshold = i64::MAX;
                        break;
                    }
                }
            }
        } else {
            threshold = i64::MAX;
        }

        let xp_in_current_level = xp.saturating_sub(xp_for_current_level);
        let xp_needed_for_level = threshold.saturating_sub(xp_for_current_level);
        let progress_percentage = if xp_needed_for_level > 0 {
            let scaled = i128::from(xp_in_current_level) * 100;
            (scaled.div_euclid(i128::from(xp_needed_for_level))) as i64
        } else {
            100
        };

        LevelStats {
            level,
            current_xp: xp,
            xp_for_current_level,
            xp_for_next_level: threshold,
            xp_in_current_level,
            xp_needed_for_level,
            progress_percentage,
            xp_to_next_level: threshold.saturating_sub(xp),
        }
    }

    /// Level stats after adding `awarded_xp` to `current_xp`.
    ///
    /// Pure: persisting XP is the ledger's job.
    pub fn award(&self, current_xp: i64, awarded_xp: i64) -> XpAward {
        let before = self.calculate(current_xp);
        let after = self.calculate(current_xp.saturating_add(awarded_xp));
        XpAward {
            stats: after,
            xp_awarded: awarded_xp,
            leveled_up: after.level > before.level,
            levels_gained: after.level.saturating_sub(before.level),
        }
    }
}

/// [`LevelCurve::calculate`] on the default curve
pub fn calculate_level(xp: i64) -> LevelStats {
    LevelCurve::default().calculate(xp)
}

/// [`LevelCurve::award`] on the default curve
pub fn award_xp(current_xp: i64, awarded_xp: i64) -> XpAward {
    LevelCurve::default().award(current_xp, awarded_xp)
}

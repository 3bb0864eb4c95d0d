//! Data models for progress tracking
//!
//! These mirror the JSON documents kept in the store. Field names are the
//! camelCase names other readers of the same documents expect.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::levels::XpAward;
use crate::store::DocRef;

/// Collection holding one [`UserProgress`] per user id
pub const USER_PROGRESS_COLLECTION: &str = "userProgress";

/// Collection holding the externally owned user records
pub const USERS_COLLECTION: &str = "users";

pub fn user_progress_ref(user_id: &str) -> DocRef {
    DocRef::new(USER_PROGRESS_COLLECTION, user_id)
}

pub fn user_ref(user_id: &str) -> DocRef {
    DocRef::new(USERS_COLLECTION, user_id)
}

/// Kind of gradable work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChallengeType {
    Challenge,
    Quiz,
    DebuggerChallenge,
}

impl ChallengeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Challenge => "challenge",
            Self::Quiz => "quiz",
            Self::DebuggerChallenge => "debuggerChallenge",
        }
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best result recorded for one challenge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRecord {
    /// Highest XP ever recorded for this challenge
    pub xp: i64,
    pub completed: bool,
    #[serde(rename = "type")]
    pub kind: ChallengeType,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Completion counters, one per challenge type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStats {
    #[serde(default)]
    pub challenges_completed: u64,
    #[serde(default)]
    pub quizzes_completed: u64,
    #[serde(default)]
    pub debuggers_completed: u64,
}

impl ProgressStats {
    /// Name of the counter that tracks `kind`
    pub fn counter_field(kind: ChallengeType) -> &'static str {
        match kind {
            ChallengeType::Challenge => "challengesCompleted",
            ChallengeType::Quiz => "quizzesCompleted",
            ChallengeType::DebuggerChallenge => "debuggersCompleted",
        }
    }

    pub fn count(&self, kind: ChallengeType) -> u64 {
        match kind {
            ChallengeType::Challenge => self.challenges_completed,
            ChallengeType::Quiz => self.quizzes_completed,
            ChallengeType::DebuggerChallenge => self.debuggers_completed,
        }
    }

    /// Bump the counter that tracks `kind`
    pub fn record_completion(&mut self, kind: ChallengeType) {
        let counter = match kind {
            ChallengeType::Challenge => &mut self.challenges_completed,
            ChallengeType::Quiz => &mut self.quizzes_completed,
            ChallengeType::DebuggerChallenge => &mut self.debuggers_completed,
        };
        *counter = counter.saturating_add(1);
    }
}

/// A user's progress document (zero-valued when the user has none yet)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    #[serde(rename = "totalXP", default)]
    pub total_xp: i64,
    #[serde(default)]
    pub challenges: HashMap<String, ChallengeRecord>,
    #[serde(default)]
    pub stats: ProgressStats,
    #[serde(default)]
    pub last_active: Option<DateTime<Utc>>,
}

/// XP total read from the user record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserXp {
    pub xp: i64,
}

/// One challenge result to apply to a user's progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeResult {
    pub user_id: String,
    pub challenge_id: String,
    pub kind: ChallengeType,
    pub completed: bool,
    pub xp: i64,
}

impl ChallengeResult {
    pub fn new(
        user_id: impl Into<String>,
        challenge_id: impl Into<String>,
        kind: ChallengeType,
        completed: bool,
        xp: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            challenge_id: challenge_id.into(),
            kind,
            completed,
            xp,
        }
    }
}

/// What an accepted result changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    /// Type stored for the challenge (fixed by its first write)
    #[serde(rename = "type")]
    pub kind: ChallengeType,
    #[serde(rename = "previousXP")]
    pub previous_xp: i64,
    #[serde(rename = "newXP")]
    pub new_xp: i64,
    pub delta: i64,
    #[serde(rename = "totalXP")]
    pub total_xp: i64,
    /// True when this result moved the challenge into "completed"
    pub new_completion: bool,
    /// Level movement caused by the delta on the user's total
    pub award: XpAward,
}

/// Outcome of recording a challenge result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RecordOutcome {
    /// XP was not higher than what is already recorded; nothing was written
    Skipped {
        #[serde(rename = "recordedXP")]
        recorded_xp: i64,
    },
    Applied(ProgressUpdate),
}

impl RecordOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn update(&self) -> Option<&ProgressUpdate> {
        match self {
            Self::Applied(update) => Some(update),
            Self::Skipped { .. } => None,
        }
    }
}

//! Progress ledger - applies challenge results to a user's progress
//!
//! Every accepted result touches two documents in one transaction:
//! `userProgress/{uid}` (challenge record, counters, total) and
//! `users/{uid}` (`stats.xp` incremented by the same delta). A result whose
//! XP is not higher than the recorded one writes nothing.

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::levels::{LevelCurve, LevelStats};
use super::models::{
    user_progress_ref, user_ref, ChallengeResult, ChallengeType, ProgressUpdate, RecordOutcome,
    UserProgress, UserXp,
};
use crate::store::{get_at_path, DocumentStore, FieldPath, FieldValue, Fields, StoreError};

/// Records challenge results and reads back XP
#[derive(Clone)]
pub struct ProgressLedger<S> {
    store: S,
    curve: LevelCurve,
}

impl<S: DocumentStore> ProgressLedger<S> {
    pub fn new(store: S, curve: LevelCurve) -> Self {
        Self { store, curve }
    }

    /// Record a debugging exercise result
    pub fn record_debugger_result(
        &self,
        user_id: &str,
        challenge_id: &str,
        completed: bool,
        xp: i64,
    ) -> Result<RecordOutcome, StoreError> {
        self.record_result(&ChallengeResult::new(
            user_id,
            challenge_id,
            ChallengeType::DebuggerChallenge,
            completed,
            xp,
        ))
    }

    /// Record a coding problem result
    pub fn record_problem_result(
        &self,
        user_id: &str,
        challenge_id: &str,
        completed: bool,
        xp: i64,
    ) -> Result<RecordOutcome, StoreError> {
        self.record_result(&ChallengeResult::new(
            user_id,
            challenge_id,
            ChallengeType::Challenge,
            completed,
            xp,
        ))
    }

    /// Record a quiz result. Submitting a quiz always counts as completing it.
    pub fn record_quiz_result(
        &self,
        user_id: &str,
        challenge_id: &str,
        xp: i64,
    ) -> Result<RecordOutcome, StoreError> {
        self.record_result(&ChallengeResult::new(
            user_id,
            challenge_id,
            ChallengeType::Quiz,
            true,
            xp,
        ))
    }

    /// Apply one result atomically.
    ///
    /// The transaction body may run several times under contention, so it
    /// only computes from what it reads; logging happens after commit.
    pub fn record_result(&self, result: &ChallengeResult) -> Result<RecordOutcome, StoreError> {
        let progress_ref = user_progress_ref(&result.user_id);
        let user_ref = user_ref(&result.user_id);
        let curve = self.curve;

        let outcome = self.store.run_transaction(|tx| {
            let progress: UserProgress = tx.get_or_default(&progress_ref)?;
            let previous = progress.challenges.get(&result.challenge_id);
            let previous_xp = previous.map_or(0, |record| record.xp);

            if result.xp <= previous_xp {
                return Ok(RecordOutcome::Skipped {
                    recorded_xp: previous_xp,
                });
            }

            let kind = previous.map_or(result.kind, |record| record.kind);
            let was_completed = previous.is_some_and(|record| record.completed);
            let new_completion = !was_completed && result.completed;
            let delta = result.xp - previous_xp;
            let total_xp = progress.total_xp.checked_add(delta).ok_or_else(|| {
                StoreError::XpOverflow {
                    doc: progress_ref.to_string(),
                }
            })?;

            let challenge_path = FieldPath::from_segments(["challenges", result.challenge_id.as_str()]);
            let completed_at_path = FieldPath::from_segments([
                "challenges",
                result.challenge_id.as_str(),
                "completedAt",
            ]);
            let mut stats = progress.stats;
            if new_completion {
                stats.record_completion(kind);
            }

            // All three counters are written so a fresh document has zeroed stats
            let fields = Fields::new()
                .with(
                    challenge_path,
                    json!({
                        "xp": result.xp,
                        "completed": was_completed || result.completed,
                        "type": kind,
                    }),
                )
                .with(completed_at_path, FieldValue::ServerTimestamp)
                .with("stats", json!(stats))
                .with("totalXP", total_xp)
                .with("lastActive", FieldValue::ServerTimestamp);
            tx.set(&progress_ref, fields, true);

            tx.update(
                &user_ref,
                Fields::new()
                    .with("stats.xp", FieldValue::Increment(delta))
                    .with("lastActive", FieldValue::ServerTimestamp),
            );

            Ok(RecordOutcome::Applied(ProgressUpdate {
                kind,
                previous_xp,
                new_xp: result.xp,
                delta,
                total_xp,
                new_completion,
                award: curve.award(progress.total_xp, delta),
            }))
        })?;

        match &outcome {
            RecordOutcome::Skipped { recorded_xp } => {
                debug!(
                    user = %result.user_id,
                    challenge = %result.challenge_id,
                    submitted = result.xp,
                    recorded = recorded_xp,
                    "XP not higher than recorded, skipping"
                );
            }
            RecordOutcome::Applied(update) => {
                if update.kind != result.kind {
                    warn!(
                        user = %result.user_id,
                        challenge = %result.challenge_id,
                        stored = %update.kind,
                        submitted = %result.kind,
                        "challenge type differs from first recorded type, keeping stored type"
                    );
                }
                info!(
                    user = %result.user_id,
                    challenge = %result.challenge_id,
                    kind = %update.kind,
                    delta = update.delta,
                    total_xp = update.total_xp,
                    new_completion = update.new_completion,
                    "recorded challenge result"
                );
                if update.award.leveled_up {
                    info!(
                        user = %result.user_id,
                        level = update.award.stats.level,
                        gained = update.award.levels_gained,
                        "level up"
                    );
                }
            }
        }

        Ok(outcome)
    }

    /// XP on the user record; 0 if the user or the field does not exist.
    ///
    /// Other writers may have stored the total as a float, which is truncated.
    pub fn get_user_xp(&self, user_id: &str) -> Result<UserXp, StoreError> {
        let doc = user_ref(user_id);
        let Some(user) = self.store.get(&doc)? else {
            return Ok(UserXp::default());
        };
        let xp = match get_at_path(&user, &"stats.xp".into()) {
            None | Some(Value::Null) => 0,
            Some(value) => match (value.as_i64(), value.as_f64()) {
                (Some(xp), _) => xp,
                (None, Some(xp)) if xp.is_finite() => xp as i64,
                _ => crate::store::decode(&doc, value.clone())?,
            },
        };
        Ok(UserXp { xp })
    }

    /// Level stats for the XP on the user record
    pub fn get_user_level(&self, user_id: &str) -> Result<LevelStats, StoreError> {
        let UserXp { xp } = self.get_user_xp(user_id)?;
        Ok(self.curve.calculate(xp))
    }

    /// Full progress document, zero-valued if the user has none yet
    pub fn get_progress(&self, user_id: &str) -> Result<UserProgress, StoreError> {
        let doc = user_progress_ref(user_id);
        match self.store.get(&doc)? {
            Some(value) => crate::store::decode(&doc, value),
            None => Ok(UserProgress::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocRef, MemoryStore};
    use serde_json::json;

    fn ledger_with_user(user_id: &str) -> (ProgressLedger<MemoryStore>, MemoryStore) {
        let store = MemoryStore::new();
        store
            .run_transaction(|tx| {
                tx.set(
                    &user_ref(user_id),
                    Fields::new()
                        .with("displayName", "Ada")
                        .with("stats.xp", 0),
                    false,
                );
                Ok(())
            })
            .unwrap();
        (ProgressLedger::new(store.clone(), LevelCurve::default()), store)
    }

    #[test]
    fn test_first_quiz_result_creates_progress() {
        let (ledger, _) = ledger_with_user("u1");
        let outcome = ledger.record_quiz_result("u1", "q1", 80).unwrap();

        let update = outcome.update().unwrap();
        assert_eq!(update.previous_xp, 0);
        assert_eq!(update.delta, 80);
        assert_eq!(update.total_xp, 80);
        assert!(update.new_completion);

        let progress = ledger.get_progress("u1").unwrap();
        assert_eq!(progress.total_xp, 80);
        assert_eq!(progress.stats.quizzes_completed, 1);
        let record = &progress.challenges["q1"];
        assert_eq!(record.xp, 80);
        assert!(record.completed);
        assert_eq!(record.kind, ChallengeType::Quiz);
        assert!(record.completed_at.is_some());
        assert!(progress.last_active.is_some());

        assert_eq!(ledger.get_user_xp("u1").unwrap().xp, 80);
    }

    #[test]
    fn test_lower_quiz_score_is_ignored() {
        let (ledger, _) = ledger_with_user("u1");
        ledger.record_quiz_result("u1", "q1", 80).unwrap();
        let outcome = ledger.record_quiz_result("u1", "q1", 60).unwrap();

        assert_eq!(outcome, RecordOutcome::Skipped { recorded_xp: 80 });
        assert_eq!(ledger.get_progress("u1").unwrap().challenges["q1"].xp, 80);
        assert_eq!(ledger.get_user_xp("u1").unwrap().xp, 80);
    }

    #[test]
    fn test_equal_xp_is_a_no_op() {
        let (ledger, store) = ledger_with_user("u1");
        ledger.record_problem_result("u1", "p1", true, 50).unwrap();
        let before = store.load(&user_progress_ref("u1")).unwrap().unwrap();

        let outcome = ledger.record_problem_result("u1", "p1", true, 50).unwrap();
        assert!(!outcome.is_applied());

        let after = store.load(&user_progress_ref("u1")).unwrap().unwrap();
        assert_eq!(before, after);
        assert_eq!(after.data["stats"]["challengesCompleted"], 1);
    }

    #[test]
    fn test_completion_counted_once() {
        let (ledger, _) = ledger_with_user("u1");
        ledger.record_problem_result("u1", "p1", false, 20).unwrap();
        assert_eq!(ledger.get_progress("u1").unwrap().stats.challenges_completed, 0);

        let first = ledger.record_problem_result("u1", "p1", true, 40).unwrap();
        assert!(first.update().unwrap().new_completion);
        let second = ledger.record_problem_result("u1", "p1", true, 60).unwrap();
        assert!(!second.update().unwrap().new_completion);

        let progress = ledger.get_progress("u1").unwrap();
        assert_eq!(progress.stats.challenges_completed, 1);
        assert_eq!(progress.total_xp, 60);
        assert_eq!(ledger.get_user_xp("u1").unwrap().xp, 60);
    }

    #[test]
    fn test_completed_flag_never_reverts() {
        let (ledger, _) = ledger_with_user("u1");
        ledger.record_debugger_result("u1", "d1", true, 30).unwrap();
        ledger.record_debugger_result("u1", "d1", false, 45).unwrap();

        let progress = ledger.get_progress("u1").unwrap();
        assert!(progress.challenges["d1"].completed);
        assert_eq!(progress.challenges["d1"].xp, 45);
        assert_eq!(progress.stats.debuggers_completed, 1);
    }

    #[test]
    fn test_zero_xp_result_is_skipped() {
        let (ledger, store) = ledger_with_user("u1");
        let outcome = ledger.record_problem_result("u1", "p1", true, 0).unwrap();
        assert_eq!(outcome, RecordOutcome::Skipped { recorded_xp: 0 });
        assert!(store.load(&user_progress_ref("u1")).unwrap().is_none());
    }

    #[test]
    fn test_total_xp_overflow_is_rejected() {
        let (ledger, store) = ledger_with_user("u1");
        ledger.record_quiz_result("u1", "a", i64::MAX).unwrap();
        let before = store.load(&user_progress_ref("u1")).unwrap().unwrap();

        let err = ledger.record_quiz_result("u1", "b", 10).unwrap_err();
        assert!(matches!(err, StoreError::XpOverflow { ref doc } if doc == "userProgress/u1"));
        assert!(!err.is_transient());

        let after = store.load(&user_progress_ref("u1")).unwrap().unwrap();
        assert_eq!(before, after);
        assert!(after.data["challenges"].get("b").is_none());
        assert_eq!(ledger.get_progress("u1").unwrap().total_xp, i64::MAX);
        assert_eq!(ledger.get_user_xp("u1").unwrap().xp, i64::MAX);
    }

    #[test]
    fn test_first_incomplete_result_writes_zeroed_stats() {
        let (ledger, store) = ledger_with_user("u1");
        ledger.record_problem_result("u1", "p1", false, 20).unwrap();

        let raw = store.get(&user_progress_ref("u1")).unwrap().unwrap();
        assert_eq!(
            raw["stats"],
            json!({
                "challengesCompleted": 0,
                "quizzesCompleted": 0,
                "debuggersCompleted": 0,
            })
        );

        ledger.record_debugger_result("u1", "d1", true, 5).unwrap();
        let raw = store.get(&user_progress_ref("u1")).unwrap().unwrap();
        assert_eq!(raw["stats"]["debuggersCompleted"], 1);
        assert_eq!(raw["stats"]["challengesCompleted"], 0);
    }

    #[test]
    fn test_float_user_xp_is_read() {
        let (ledger, store) = ledger_with_user("u1");
        store
            .run_transaction(|tx| {
                tx.set(&user_ref("u1"), Fields::new().with("stats.xp", json!(10.0)), true);
                Ok(())
            })
            .unwrap();
        assert_eq!(ledger.get_user_xp("u1").unwrap().xp, 10);

        ledger.record_quiz_result("u1", "q1", 5).unwrap();
        assert_eq!(ledger.get_user_xp("u1").unwrap().xp, 15);
        assert_eq!(ledger.get_user_level("u1").unwrap().current_xp, 15);
    }

    #[test]
    fn test_non_numeric_user_xp_is_a_decode_error() {
        let (ledger, store) = ledger_with_user("u1");
        store
            .run_transaction(|tx| {
                tx.set(&user_ref("u1"), Fields::new().with("stats.xp", "lots"), true);
                Ok(())
            })
            .unwrap();

        let err = ledger.get_user_xp("u1").unwrap_err();
        assert!(matches!(err, StoreError::Decode { doc, .. } if doc == "users/u1"));
    }

    #[test]
    fn test_type_fixed_by_first_write() {
        let (ledger, _) = ledger_with_user("u1");
        ledger.record_quiz_result("u1", "x1", 10).unwrap();
        let outcome = ledger.record_problem_result("u1", "x1", true, 20).unwrap();

        let update = outcome.update().unwrap();
        assert_eq!(update.kind, ChallengeType::Quiz);
        assert!(!update.new_completion);

        let progress = ledger.get_progress("u1").unwrap();
        assert_eq!(progress.challenges["x1"].kind, ChallengeType::Quiz);
        assert_eq!(progress.stats.challenges_completed, 0);
        assert_eq!(progress.stats.quizzes_completed, 1);
    }

    #[test]
    fn test_untouched_fields_are_preserved() {
        let (ledger, store) = ledger_with_user("u1");
        store
            .run_transaction(|tx| {
                tx.set(
                    &user_progress_ref("u1"),
                    Fields::new().with("streak", 4),
                    true,
                );
                Ok(())
            })
            .unwrap();

        ledger.record_quiz_result("u1", "q1", 10).unwrap();
        ledger.record_quiz_result("u1", "q2", 15).unwrap();

        let progress = store.get(&user_progress_ref("u1")).unwrap().unwrap();
        assert_eq!(progress["streak"], 4);
        assert_eq!(progress["totalXP"], 25);

        let user = store.get(&user_ref("u1")).unwrap().unwrap();
        assert_eq!(user["displayName"], "Ada");
        assert_eq!(user["stats"]["xp"], 25);
        assert!(user["lastActive"].is_string());
    }

    #[test]
    fn test_missing_user_record_fails_without_writes() {
        let store = MemoryStore::new();
        let ledger = ProgressLedger::new(store.clone(), LevelCurve::default());

        let err = ledger.record_quiz_result("ghost", "q1", 10).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(doc) if doc == "users/ghost"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_user_xp_defaults_to_zero() {
        let (ledger, store) = ledger_with_user("u1");
        assert_eq!(ledger.get_user_xp("nobody").unwrap(), UserXp { xp: 0 });

        store
            .run_transaction(|tx| {
                tx.set(&DocRef::new("users", "bare"), Fields::new().with("name", "x"), false);
                Ok(())
            })
            .unwrap();
        assert_eq!(ledger.get_user_xp("bare").unwrap().xp, 0);
        assert_eq!(ledger.get_user_level("bare").unwrap().level, 1);
        assert_eq!(ledger.get_progress("nobody").unwrap(), UserProgress::default());
    }

    #[test]
    fn test_award_reflects_total_xp() {
        let (ledger, _) = ledger_with_user("u1");
        ledger.record_quiz_result("u1", "q1", 95).unwrap();
        let outcome = ledger.record_quiz_result("u1", "q2", 10).unwrap();

        let award = outcome.update().unwrap().award;
        assert!(award.leveled_up);
        assert_eq!(award.levels_gained, 1);
        assert_eq!(award.stats.current_xp, 105);
        assert_eq!(ledger.get_user_level("u1").unwrap().level, 2);
    }

    #[test]
    fn test_challenge_ids_with_dots() {
        let (ledger, store) = ledger_with_user("u1");
        ledger.record_quiz_result("u1", "week.1", 30).unwrap();

        let raw = store.get(&user_progress_ref("u1")).unwrap().unwrap();
        assert_eq!(raw["challenges"]["week.1"]["xp"], json!(30));
        assert_eq!(ledger.get_progress("u1").unwrap().challenges["week.1"].xp, 30);
    }
}

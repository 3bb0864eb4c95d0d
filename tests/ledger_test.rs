//! Ledger behaviour against the SQLite store

mod common;

use std::collections::HashMap;

use common::sqlite_manager;
use xpledger::progress::user_progress_ref;
use xpledger::{DocumentStore, ProgressManager, RecordOutcome, StoreError};

#[test]
fn quiz_rescored_lower_keeps_best_score() {
    let (_dir, manager) = sqlite_manager();
    manager.ensure_user("u1", None).unwrap();
    let ledger = manager.ledger();

    assert!(ledger.record_quiz_result("u1", "q1", 80).unwrap().is_applied());
    assert_eq!(
        ledger.record_quiz_result("u1", "q1", 60).unwrap(),
        RecordOutcome::Skipped { recorded_xp: 80 }
    );

    let progress = ledger.get_progress("u1").unwrap();
    assert_eq!(progress.challenges["q1"].xp, 80);
    assert_eq!(progress.total_xp, 80);
    assert_eq!(ledger.get_user_xp("u1").unwrap().xp, 80);
}

#[test]
fn repeated_problem_completion_counts_once() {
    let (_dir, manager) = sqlite_manager();
    manager.ensure_user("u1", None).unwrap();
    let ledger = manager.ledger();

    ledger.record_problem_result("u1", "p1", true, 50).unwrap();
    let before = manager.store().load(&user_progress_ref("u1")).unwrap().unwrap();

    let outcome = ledger.record_problem_result("u1", "p1", true, 50).unwrap();
    assert!(!outcome.is_applied());

    // Nothing was rewritten, not even timestamps
    let after = manager.store().load(&user_progress_ref("u1")).unwrap().unwrap();
    assert_eq!(before, after);
    assert_eq!(ledger.get_progress("u1").unwrap().stats.challenges_completed, 1);
}

#[test]
fn total_is_sum_of_best_scores_and_mirrors_user_xp() {
    let (_dir, manager) = sqlite_manager();
    manager.ensure_user("u1", None).unwrap();
    let ledger = manager.ledger();

    let submissions: &[(&str, i64)] = &[
        ("q1", 30),
        ("q2", 10),
        ("q1", 70),
        ("q3", 0),
        ("q2", 5),
        ("q1", 70),
        ("q4", 45),
        ("q2", 25),
        ("q4", 44),
    ];

    let mut best: HashMap<&str, i64> = HashMap::new();
    let mut applied_deltas = 0;
    for &(challenge, xp) in submissions {
        let outcome = ledger.record_quiz_result("u1", challenge, xp).unwrap();
        if let Some(update) = outcome.update() {
            applied_deltas += update.delta;
        }
        let entry = best.entry(challenge).or_insert(0);
        *entry = (*entry).max(xp);
    }

    let expected: i64 = best.values().sum();
    let progress = ledger.get_progress("u1").unwrap();
    assert_eq!(expected, 140);
    assert_eq!(progress.total_xp, expected);
    assert_eq!(
        progress.challenges.values().map(|r| r.xp).sum::<i64>(),
        expected
    );
    assert_eq!(applied_deltas, expected);
    assert_eq!(ledger.get_user_xp("u1").unwrap().xp, expected);
    // q3 scored 0 and was never written
    assert!(!progress.challenges.contains_key("q3"));
}

#[test]
fn counters_track_each_challenge_type() {
    let (_dir, manager) = sqlite_manager();
    manager.ensure_user("u1", None).unwrap();
    let ledger = manager.ledger();

    ledger.record_problem_result("u1", "p1", true, 10).unwrap();
    ledger.record_problem_result("u1", "p2", false, 10).unwrap();
    ledger.record_quiz_result("u1", "q1", 10).unwrap();
    ledger.record_quiz_result("u1", "q2", 10).unwrap();
    ledger.record_debugger_result("u1", "d1", true, 10).unwrap();
    ledger.record_debugger_result("u1", "d1", true, 20).unwrap();

    let stats = ledger.get_progress("u1").unwrap().stats;
    assert_eq!(stats.challenges_completed, 1);
    assert_eq!(stats.quizzes_completed, 2);
    assert_eq!(stats.debuggers_completed, 1);
}

#[test]
fn user_xp_keeps_deltas_applied_on_top_of_external_changes() {
    let (_dir, manager) = sqlite_manager();
    manager.ensure_user("u1", None).unwrap();
    let ledger = manager.ledger();

    ledger.record_quiz_result("u1", "q1", 40).unwrap();

    // Some other path grants a bonus directly on the user record
    manager
        .store()
        .run_transaction(|tx| {
            tx.update(
                &xpledger::progress::user_ref("u1"),
                xpledger::store::Fields::new()
                    .with("stats.xp", xpledger::store::FieldValue::Increment(500)),
            );
            Ok(())
        })
        .unwrap();

    ledger.record_quiz_result("u1", "q1", 50).unwrap();
    assert_eq!(ledger.get_user_xp("u1").unwrap().xp, 550);
    assert_eq!(ledger.get_progress("u1").unwrap().total_xp, 50);
}

#[test]
fn progress_persists_across_reopen() {
    let (dir, manager) = sqlite_manager();
    manager.ensure_user("u1", None).unwrap();
    manager.ledger().record_quiz_result("u1", "q1", 120).unwrap();
    drop(manager);

    let reopened = ProgressManager::with_path(&dir.path().join("progress.db")).unwrap();
    let ledger = reopened.ledger();
    assert_eq!(ledger.get_user_xp("u1").unwrap().xp, 120);
    assert_eq!(ledger.get_user_level("u1").unwrap().level, 2);
    assert_eq!(
        ledger.record_quiz_result("u1", "q1", 100).unwrap(),
        RecordOutcome::Skipped { recorded_xp: 120 }
    );
}

#[test]
fn unknown_user_is_reported_and_nothing_is_written() {
    let (_dir, manager) = sqlite_manager();
    let err = manager
        .ledger()
        .record_quiz_result("ghost", "q1", 10)
        .unwrap_err();

    assert!(matches!(err, StoreError::NotFound(_)));
    assert!(!err.is_transient());
    assert_eq!(manager.store().count("userProgress").unwrap(), 0);
    assert_eq!(manager.ledger().get_user_xp("ghost").unwrap().xp, 0);
}

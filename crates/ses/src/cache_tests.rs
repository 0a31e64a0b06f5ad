// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use sec_core::{ArgCapture, ProcedureState, Script};

use super::Cache;

fn script() -> Script {
    Script::filesystem("file:///test.rhai")
}

#[test]
fn seed_keeps_the_longer_history_on_a_race() {
    let cache = Cache::new(10);
    cache.record_transition(1, ProcedureState::Creating, 1);
    cache.seed(1, script(), ArgCapture::new("init", 0), vec![]);
    assert_eq!(cache.state_of(1), Some(ProcedureState::Unknown));

    // record_transition on an unseeded pid is a no-op; seeding after the
    // fact recovers nothing it didn't already see, but never regresses
    // an entry that did get seeded first.
    cache.seed(2, script(), ArgCapture::new("init", 0), vec![(ProcedureState::Creating, 1), (ProcedureState::Idle, 2)]);
    cache.record_transition(2, ProcedureState::Loading, 3);
    assert_eq!(cache.state_of(2), Some(ProcedureState::Loading));
}

#[test]
fn retention_evicts_oldest_terminal_by_timestamp_then_pid() {
    let cache = Cache::new(1);
    cache.seed(1, script(), ArgCapture::new("init", 0), vec![]);
    cache.seed(2, script(), ArgCapture::new("init", 0), vec![]);
    cache.record_transition(1, ProcedureState::Complete, 5);
    cache.record_transition(2, ProcedureState::Complete, 10);
    // Only 1 terminal procedure is retained; pid 1 (older terminal timestamp) is evicted.
    assert_eq!(cache.summaries(None).unwrap().len(), 1);
    assert!(cache.summary(1).is_none());
    assert!(cache.summary(2).is_some());
}

#[tokio::test]
async fn await_state_returns_once_predicate_matches() {
    let cache = std::sync::Arc::new(Cache::new(10));
    cache.seed(1, script(), ArgCapture::new("init", 0), vec![]);

    let waiter_cache = cache.clone();
    let waiter = tokio::spawn(async move {
        waiter_cache.await_state(1, |s| s == ProcedureState::Ready, Duration::from_secs(1)).await
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    cache.record_transition(1, ProcedureState::Idle, 1);
    cache.record_transition(1, ProcedureState::Ready, 2);

    assert_eq!(waiter.await.unwrap(), Some(ProcedureState::Ready));
}

#[tokio::test]
async fn await_state_times_out_when_nothing_arrives() {
    let cache = Cache::new(10);
    cache.seed(1, script(), ArgCapture::new("init", 0), vec![]);
    let state = cache.await_state(1, |s| s == ProcedureState::Ready, Duration::from_millis(20)).await;
    assert_eq!(state, Some(ProcedureState::Unknown));
}

#[tokio::test]
async fn await_state_stops_early_on_an_unexpected_terminal_state() {
    let cache = std::sync::Arc::new(Cache::new(10));
    cache.seed(1, script(), ArgCapture::new("init", 0), vec![]);

    let waiter_cache = cache.clone();
    let waiter = tokio::spawn(async move {
        waiter_cache.await_state(1, |s| s == ProcedureState::Ready, Duration::from_secs(1)).await
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    cache.record_transition(1, ProcedureState::Failed, 1);

    assert_eq!(waiter.await.unwrap(), Some(ProcedureState::Failed));
}

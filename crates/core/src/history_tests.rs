// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn current_state_defaults_to_unknown() {
    let h = History::new();
    assert_eq!(h.current_state(), ProcedureState::Unknown);
}

#[test]
fn current_state_is_last_pushed() {
    let mut h = History::new();
    h.push(ProcedureState::Creating, 1);
    h.push(ProcedureState::Idle, 2);
    assert_eq!(h.current_state(), ProcedureState::Idle);
}

#[test]
fn terminal_at_only_set_on_terminal_state() {
    let mut h = History::new();
    h.push(ProcedureState::Creating, 1);
    assert_eq!(h.terminal_at(), None);
    h.push(ProcedureState::Complete, 5);
    assert_eq!(h.terminal_at(), Some(5));
}

#[test]
fn stacktrace_recorded_on_failure() {
    let mut h = History::new();
    h.push(ProcedureState::Failed, 1);
    h.set_stacktrace("boom trace");
    assert_eq!(h.stacktrace.as_deref(), Some("boom trace"));
}

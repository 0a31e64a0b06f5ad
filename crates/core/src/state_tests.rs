// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn terminal_states_absorb() {
    assert!(ProcedureState::Complete.is_terminal());
    assert!(ProcedureState::Failed.is_terminal());
    assert!(ProcedureState::Stopped.is_terminal());
    assert!(ProcedureState::Unknown.is_terminal());
    assert!(!ProcedureState::Running.is_terminal());
}

#[test]
fn stoppable_states_match_spec() {
    for s in [ProcedureState::Idle, ProcedureState::Loading, ProcedureState::Ready, ProcedureState::Running] {
        assert!(s.is_stoppable(), "{s} should be stoppable");
    }
    for s in [ProcedureState::Creating, ProcedureState::Complete, ProcedureState::Failed] {
        assert!(!s.is_stoppable(), "{s} should not be stoppable");
    }
}

#[test]
fn happy_path_transitions_are_legal() {
    use ProcedureState::*;
    let path = [Creating, Idle, Loading, Idle, Ready, Running, Complete];
    for pair in path.windows(2) {
        assert!(pair[0].can_transition_to(pair[1]), "{} -> {} should be legal", pair[0], pair[1]);
    }
}

#[test]
fn terminal_state_rejects_further_transitions() {
    assert!(!ProcedureState::Complete.can_transition_to(ProcedureState::Running));
    assert!(!ProcedureState::Failed.can_transition_to(ProcedureState::Idle));
}

#[test]
fn display_matches_wire_names() {
    assert_eq!(ProcedureState::Running.to_string(), "RUNNING");
    assert_eq!(ProcedureState::Unknown.to_string(), "UNKNOWN");
}

#[test]
fn parse_roundtrips_through_display() {
    for state in [
        ProcedureState::Unknown,
        ProcedureState::Creating,
        ProcedureState::Idle,
        ProcedureState::Loading,
        ProcedureState::Ready,
        ProcedureState::Running,
        ProcedureState::Complete,
        ProcedureState::Stopped,
        ProcedureState::Failed,
    ] {
        assert_eq!(ProcedureState::parse(&state.to_string()), Some(state));
    }
}

#[test]
fn parse_rejects_unknown_strings() {
    assert_eq!(ProcedureState::parse("not-a-state"), None);
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn new_procedure_has_one_init_capture() {
    let p = Procedure::new(1, Script::filesystem("file:///a.rhai"), ArgCapture::new("init", 0));
    assert_eq!(p.arg_captures.len(), 1);
    assert_eq!(p.init_capture().function_name, "init");
}

#[test]
fn fresh_procedure_state_is_unknown_until_history_recorded() {
    let p = Procedure::new(1, Script::filesystem("file:///a.rhai"), ArgCapture::new("init", 0));
    assert_eq!(p.state(), ProcedureState::Unknown);
    assert!(!p.is_terminal());
}

#[test]
fn builder_produces_usable_procedure() {
    let p = Procedure::builder().pid(7).build();
    assert_eq!(p.pid, 7);
    assert_eq!(p.init_capture().function_name, "init");
}

#[test]
fn summary_mirrors_procedure_fields() {
    let mut p = Procedure::builder().pid(3).build();
    p.history.push(ProcedureState::Creating, 1);
    p.history.push(ProcedureState::Complete, 2);
    let summary = p.summary();
    assert_eq!(summary.pid, 3);
    assert_eq!(summary.state, ProcedureState::Complete);
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use sec_core::{ArgCapture, FakeClock, Procedure, ProcedureState, Script, SupervisorConfig};

use super::Supervisor;

fn seeded(supervisor: &Supervisor<FakeClock>, pid: u64) {
    supervisor.registry.lock().insert(Procedure::builder().pid(pid).init_capture(ArgCapture::new("init", 0)).build());
}

#[tokio::test]
async fn load_resolution_is_none_before_loading_is_observed() {
    let supervisor = Supervisor::new(SupervisorConfig::default(), FakeClock::new());
    seeded(&supervisor, 1);
    assert!(supervisor.load_resolution(1).is_none());
}

#[tokio::test]
async fn load_resolution_reads_the_state_after_the_last_loading_entry() {
    let supervisor = Supervisor::new(SupervisorConfig::default(), FakeClock::new());
    seeded(&supervisor, 1);
    {
        let mut registry = supervisor.registry.lock();
        registry.record_transition(1, ProcedureState::Idle, 1).unwrap();
        registry.record_transition(1, ProcedureState::Loading, 2).unwrap();
        registry.record_transition(1, ProcedureState::Idle, 3).unwrap();
    }
    assert_eq!(supervisor.load_resolution(1), Some(ProcedureState::Idle));
}

#[tokio::test]
async fn finish_stop_records_stopped() {
    let supervisor = Supervisor::new(SupervisorConfig::default(), FakeClock::new());
    seeded(&supervisor, 1);
    supervisor.registry.lock().record_transition(1, ProcedureState::Idle, 1).unwrap();
    supervisor.finish_stop(1).unwrap();
    assert_eq!(supervisor.state_of(1).unwrap(), ProcedureState::Stopped);
}

#[tokio::test]
async fn handle_statechange_ignores_unparsable_source() {
    let supervisor = Supervisor::new(SupervisorConfig::default(), FakeClock::new());
    seeded(&supervisor, 1);
    let mut kwargs = HashMap::new();
    kwargs.insert("new_state".to_string(), serde_json::json!("IDLE"));
    supervisor.handle_statechange("not-a-pid", &kwargs);
    assert_eq!(supervisor.state_of(1).unwrap(), ProcedureState::Unknown);
}

#[tokio::test]
async fn handle_statechange_records_transition_from_worker_source() {
    let supervisor = Supervisor::new(SupervisorConfig::default(), FakeClock::new());
    seeded(&supervisor, 1);
    let mut kwargs = HashMap::new();
    kwargs.insert("new_state".to_string(), serde_json::json!("IDLE"));
    supervisor.handle_statechange("1", &kwargs);
    assert_eq!(supervisor.state_of(1).unwrap(), ProcedureState::Idle);
}

#[tokio::test]
async fn handle_fatal_synthesises_failed_once() {
    let supervisor = Supervisor::new(SupervisorConfig::default(), FakeClock::new());
    seeded(&supervisor, 1);
    supervisor.registry.lock().record_transition(1, ProcedureState::Idle, 1).unwrap();
    supervisor.handle_fatal("1", "boom");
    assert_eq!(supervisor.state_of(1).unwrap(), ProcedureState::Failed);
    assert_eq!(supervisor.registry.lock().get(1).unwrap().history.stacktrace.as_deref(), Some("boom"));
}

#[tokio::test]
async fn handle_fatal_is_a_no_op_once_already_terminal() {
    let supervisor = Supervisor::new(SupervisorConfig::default(), FakeClock::new());
    seeded(&supervisor, 1);
    supervisor.registry.lock().record_transition(1, ProcedureState::Stopped, 1).unwrap();
    supervisor.handle_fatal("1", "should be ignored");
    assert!(supervisor.registry.lock().get(1).unwrap().history.stacktrace.is_none());
}

#[tokio::test]
async fn run_rejects_unknown_pid() {
    let supervisor = Supervisor::new(SupervisorConfig::default(), FakeClock::new());
    let err = supervisor.run(99, ArgCapture::new("main", 0), false).await.unwrap_err();
    assert_eq!(err, sec_core::SecError::NotFound(99));
}

#[tokio::test]
async fn run_rejects_busy_unless_force_start() {
    let supervisor = Supervisor::new(SupervisorConfig::default(), FakeClock::new());
    seeded(&supervisor, 1);
    seeded(&supervisor, 2);
    supervisor.registry.lock().record_transition(1, ProcedureState::Running, 1).unwrap();
    supervisor.registry.lock().record_transition(2, ProcedureState::Ready, 1).unwrap();
    let err = supervisor.run(2, ArgCapture::new("main", 0), false).await.unwrap_err();
    assert_eq!(err, sec_core::SecError::Busy { running: 1, requested: 2 });
}

#[test]
fn script_needs_build_env_gate_is_respected() {
    let script = Script::Repo {
        uri: "https://example.test/repo.git".to_string(),
        revision: None,
        branch: None,
        build_env: true,
    };
    assert!(script.needs_build_env());
}

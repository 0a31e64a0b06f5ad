// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end lifecycle scenarios (§8, S1-S6), run against real
//! `sec-worker` child processes.

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use sec_core::{
    ArgCapture, Pid, PrepareProcessCommand, ProcedureState, Script, StartProcessCommand,
    StopProcessCommand, SupervisorConfig, SystemClock, Topic,
};
use sec_correlator::Correlator;
use sec_eventbus::TopicBus;
use sec_manager::Supervisor;
use sec_ses::Ses;
use serial_test::serial;

fn ensure_worker_bin() {
    if std::env::var_os("SEC_WORKER_BIN").is_none() {
        std::env::set_var("SEC_WORKER_BIN", env!("CARGO_BIN_EXE_sec-worker"));
    }
}

fn write_script(dir: &tempfile::TempDir, name: &str, contents: &str) -> Script {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).expect("create script file");
    file.write_all(contents.as_bytes()).expect("write script file");
    Script::filesystem(format!("file://{}", path.display()))
}

fn test_config() -> SupervisorConfig {
    SupervisorConfig {
        retention: 10,
        startup_timeout_ms: 5_000,
        stop_max_retries: 20,
        stop_retry_timeout_ms: 100,
        correlator_timeout_ms: 1_000,
        shutdown_escalation_count: 3,
    }
}

async fn history_states(supervisor: &Supervisor<SystemClock>, pid: Pid) -> Vec<String> {
    supervisor.history_of(pid).expect("history").into_iter().map(|(s, _)| s.to_string()).collect()
}

async fn await_terminal(supervisor: &Supervisor<SystemClock>, pid: Pid, timeout: Duration) -> ProcedureState {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let state = supervisor.state_of(pid).expect("state_of");
        if state.is_terminal() {
            return state;
        }
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for pid {pid} to reach a terminal state");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
#[serial]
async fn s1_happy_path_runs_init_then_main_to_completion() {
    ensure_worker_bin();
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(&dir, "hello.rhai", "fn init() {} fn main() { \"hello\" }");

    let supervisor = Supervisor::new(test_config(), SystemClock);
    let ses = Ses::new(supervisor.clone(), SystemClock, &test_config(), None);

    let prepared =
        ses.prepare(PrepareProcessCommand { script, init_args: ArgCapture::new("init", 0) }).await.expect("prepare");
    assert_eq!(prepared.state, ProcedureState::Ready);

    let started = ses.start(StartProcessCommand::main(prepared.pid)).await.expect("start");
    assert_eq!(started.state, ProcedureState::Running);

    let finished = await_terminal(&supervisor, prepared.pid, Duration::from_secs(5)).await;
    assert_eq!(finished, ProcedureState::Complete);

    let states = history_states(&supervisor, prepared.pid).await;
    assert_eq!(states, vec!["CREATING", "IDLE", "LOADING", "IDLE", "RUNNING", "READY", "RUNNING", "COMPLETE"]);

    let summary = ses.summarise(Some(vec![prepared.pid])).expect("summarise").remove(0);
    assert_eq!(summary.state, ProcedureState::Complete);
    assert!(summary.stacktrace.is_none());

    supervisor.shutdown().await;
}

#[tokio::test]
#[serial]
async fn s2_failure_in_main_is_recorded_with_its_stacktrace() {
    ensure_worker_bin();
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(&dir, "boom.rhai", "fn main(msg) { throw msg; }");

    let supervisor = Supervisor::new(test_config(), SystemClock);
    let ses = Ses::new(supervisor.clone(), SystemClock, &test_config(), None);

    let prepared =
        ses.prepare(PrepareProcessCommand { script, init_args: ArgCapture::new("init", 0) }).await.expect("prepare");
    assert_eq!(prepared.state, ProcedureState::Ready);

    let cmd = StartProcessCommand {
        pid: prepared.pid,
        function_name: "main".to_string(),
        positional_args: vec![serde_json::json!("boom")],
        keyword_args: HashMap::new(),
        force_start: false,
    };
    let started = ses.start(cmd).await.expect("start");
    assert_eq!(started.state, ProcedureState::Running);

    let finished = await_terminal(&supervisor, prepared.pid, Duration::from_secs(5)).await;
    assert_eq!(finished, ProcedureState::Failed);

    let states = history_states(&supervisor, prepared.pid).await;
    assert_eq!(states, vec!["CREATING", "IDLE", "LOADING", "IDLE", "READY", "RUNNING", "FAILED"]);

    let summary = ses.summarise(Some(vec![prepared.pid])).expect("summarise").remove(0);
    assert!(summary.stacktrace.expect("stacktrace").contains("boom"));

    supervisor.shutdown().await;
}

#[tokio::test]
#[serial]
async fn s3_cooperative_stop_ends_in_stopped_with_no_abort() {
    ensure_worker_bin();
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(&dir, "spin.rhai", "fn main() { loop {} }");

    let supervisor = Supervisor::new(test_config(), SystemClock);
    let ses = Ses::new(supervisor.clone(), SystemClock, &test_config(), None);

    let prepared =
        ses.prepare(PrepareProcessCommand { script, init_args: ArgCapture::new("init", 0) }).await.expect("prepare");
    ses.start(StartProcessCommand::main(prepared.pid)).await.expect("start");

    let report = ses
        .stop(StopProcessCommand { pid: prepared.pid, run_abort: false })
        .await
        .expect("stop");
    assert!(report.is_empty(), "no abort Procedure should have been created");

    let finished = await_terminal(&supervisor, prepared.pid, Duration::from_secs(5)).await;
    assert_eq!(finished, ProcedureState::Stopped);

    let summary = ses.summarise(None).expect("summarise");
    assert_eq!(summary.len(), 1, "stop(run_abort=false) must not spawn a second Procedure");

    supervisor.shutdown().await;
}

#[tokio::test]
#[serial]
async fn s4_abort_follow_on_recovers_the_subarray_id_and_starts_the_abort_script() {
    ensure_worker_bin();
    let dir = tempfile::tempdir().expect("tempdir");
    let main_script = write_script(&dir, "spin.rhai", "fn main() { loop {} }");
    let abort_script = write_script(&dir, "abort.rhai", "fn init() {} fn main() { 1 }");

    let supervisor = Supervisor::new(test_config(), SystemClock);
    let ses = Ses::new(supervisor.clone(), SystemClock, &test_config(), Some(abort_script));

    let mut keyword_args = HashMap::new();
    keyword_args.insert("subarray_id".to_string(), serde_json::json!("SA-1"));
    let init_args = ArgCapture::new("init", 0).with_keyword(keyword_args);

    let prepared = ses.prepare(PrepareProcessCommand { script: main_script, init_args }).await.expect("prepare");
    ses.start(StartProcessCommand::main(prepared.pid)).await.expect("start");

    let report = ses
        .stop(StopProcessCommand { pid: prepared.pid, run_abort: true })
        .await
        .expect("stop with abort follow-on");

    assert_eq!(supervisor.state_of(prepared.pid).expect("state_of"), ProcedureState::Stopped);
    assert_eq!(report.len(), 1, "one abort Procedure should have been created and started");
    let abort_summary = &report[0];
    assert_eq!(abort_summary.state, ProcedureState::Running);
    assert_ne!(abort_summary.pid, prepared.pid);
    assert_eq!(abort_summary.arg_captures[0].keyword_str("subarray_id"), Some("SA-1"));

    supervisor.shutdown().await;
}

#[tokio::test]
#[serial]
async fn s5_busy_rejects_a_run_while_another_procedure_is_running() {
    ensure_worker_bin();
    let dir = tempfile::tempdir().expect("tempdir");
    let running_script = write_script(&dir, "spin.rhai", "fn main() { loop {} }");
    let idle_script = write_script(&dir, "idle.rhai", "fn main() { 1 }");

    let supervisor = Supervisor::new(test_config(), SystemClock);
    let ses = Ses::new(supervisor.clone(), SystemClock, &test_config(), None);

    let p1 =
        ses.prepare(PrepareProcessCommand { script: running_script, init_args: ArgCapture::new("init", 0) })
            .await
            .expect("prepare p1");
    ses.start(StartProcessCommand::main(p1.pid)).await.expect("start p1");

    let p2 =
        ses.prepare(PrepareProcessCommand { script: idle_script, init_args: ArgCapture::new("init", 0) })
            .await
            .expect("prepare p2");
    assert_eq!(p2.state, ProcedureState::Ready);

    let err = ses.start(StartProcessCommand::main(p2.pid)).await.expect_err("p2 must be rejected while p1 runs");
    assert_eq!(err.kind_name(), "Busy");

    let p2_state = supervisor.state_of(p2.pid).expect("state_of p2");
    assert_eq!(p2_state, ProcedureState::Ready, "a rejected run must not change the target Procedure's state");

    ses.stop(StopProcessCommand { pid: p1.pid, run_abort: false }).await.expect("stop p1");
    supervisor.shutdown().await;
}

#[tokio::test]
#[serial]
async fn s6_correlator_timeout_with_no_subscriber() {
    let bus = TopicBus::new();
    let correlator = Correlator::new(bus.clone(), "caller", Duration::from_millis(100));

    let heard_reply = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = heard_reply.clone();
    let _sub = bus.subscribe(Topic::ProcedurePoolList, move |_source, _topic, _kwargs| {
        flag.store(true, std::sync::atomic::Ordering::SeqCst);
    });

    let err = correlator
        .call_and_respond(Topic::RequestProcedureList, Topic::ProcedurePoolList, sec_eventbus::Kwargs::new())
        .await
        .expect_err("no subscriber should ever answer");
    assert_eq!(err.kind_name(), "GatewayTimeout");
    assert!(!heard_reply.load(std::sync::atomic::Ordering::SeqCst));
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Process Manager (§4.3): create/run/stop Workers, drain the shared
//! outbox, and own the pid → state map.
//!
//! Grounded on `ProcessManager` (`domain.py`) for the operation shapes and
//! on `MainContext`/`Proc` (`mptools/_mptools.py`) for the supervision
//! mechanics, translated from threads+`multiprocessing` into Rust's
//! async-task model: the outbox consumer is a `tokio::task` rather than a
//! Python thread, which is the `thread/task` choice §5 leaves open.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sec_core::{
    ArgCapture, Clock, EventKind, EventMessage, Pid, Procedure, ProcedureState, ProcedureSummary,
    Script, SecError, SecResult, SupervisorConfig, Topic, WorkItem,
};
use sec_eventbus::{Bridge, Kwargs, TopicBus};
use sec_queue::Queue;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::registry::Registry;
use crate::worker_process::WorkerProcess;

const INBOX_CAPACITY: usize = 64;
const OUTBOX_POLL: Duration = Duration::from_millis(20);
const STARTUP_POLL: Duration = Duration::from_millis(10);
const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(1);

enum LoadOutcome {
    Ready,
    Failed(String),
    Timeout,
}

pub struct Supervisor<C: Clock> {
    config: SupervisorConfig,
    clock: C,
    registry: Mutex<Registry>,
    workers: Mutex<HashMap<Pid, Arc<WorkerProcess>>>,
    outbox: Queue<EventMessage>,
    bridge: Bridge,
    bus: TopicBus,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Clock + 'static> Supervisor<C> {
    pub fn new(config: SupervisorConfig, clock: C) -> Arc<Self> {
        let outbox = Queue::unbounded();
        let bus = TopicBus::new();
        let bridge = Bridge::new("supervisor", bus.clone(), outbox.clone());
        let retention = config.retention;
        let supervisor = Arc::new(Self {
            config,
            clock,
            registry: Mutex::new(Registry::new(retention)),
            workers: Mutex::new(HashMap::new()),
            outbox,
            bridge,
            bus,
            consumer: Mutex::new(None),
        });
        let handle = tokio::spawn(run_outbox_consumer(supervisor.clone()));
        *supervisor.consumer.lock() = Some(handle);
        supervisor
    }

    pub fn bus(&self) -> &TopicBus {
        &self.bus
    }

    /// Allocate a pid, spawn the Worker, and enqueue `ENV?`/`LOAD`/`RUN
    /// init`. Returns once the Worker reports `LOAD`'s outcome (success or
    /// failure) or the startup budget expires — it does not wait for
    /// `init` itself to finish running (that is the SES's job).
    pub async fn create(&self, script: Script, init_args: ArgCapture) -> SecResult<Pid> {
        let pid = {
            let mut registry = self.registry.lock();
            let pid = registry.allocate_pid();
            registry.insert(Procedure::new(pid, script.clone(), init_args.clone()));
            pid
        };

        let worker = WorkerProcess::spawn(pid, INBOX_CAPACITY, self.outbox.clone())?;
        let worker = Arc::new(worker);
        self.workers.lock().insert(pid, worker.clone());

        if script.needs_build_env() {
            let _ = worker.inbox.put(WorkItem::Env, ENQUEUE_TIMEOUT);
        }
        let _ = worker.inbox.put(WorkItem::Load { script }, ENQUEUE_TIMEOUT);
        let _ = worker.inbox.put(WorkItem::run(init_args), ENQUEUE_TIMEOUT);

        match self.wait_for_load(pid).await {
            LoadOutcome::Ready => Ok(pid),
            LoadOutcome::Failed(message) => {
                self.terminate_worker(pid);
                Err(SecError::ScriptLoadError(message))
            }
            LoadOutcome::Timeout => {
                self.terminate_worker(pid);
                Err(SecError::StartupTimeout(pid))
            }
        }
    }

    async fn wait_for_load(&self, pid: Pid) -> LoadOutcome {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(self.config.startup_timeout_ms);
        loop {
            if let Some(resolved) = self.load_resolution(pid) {
                return match resolved {
                    ProcedureState::Failed => {
                        let message = self
                            .registry
                            .lock()
                            .get(pid)
                            .and_then(|p| p.history.stacktrace.clone())
                            .unwrap_or_else(|| "script failed to load".to_string());
                        LoadOutcome::Failed(message)
                    }
                    _ => LoadOutcome::Ready,
                };
            }
            if tokio::time::Instant::now() >= deadline {
                return LoadOutcome::Timeout;
            }
            tokio::time::sleep(STARTUP_POLL).await;
        }
    }

    /// The state the Worker settled into immediately after its `LOADING`
    /// transition, or `None` if `LOAD` has not resolved yet. `CREATING`
    /// and the Worker's very first `IDLE` both precede `LOAD`, so this
    /// looks past the last `LOADING` entry rather than the first `IDLE`.
    fn load_resolution(&self, pid: Pid) -> Option<ProcedureState> {
        let registry = self.registry.lock();
        let procedure = registry.get(pid)?;
        let transitions = &procedure.history.transitions;
        let loading_at = transitions.iter().rposition(|(s, _)| *s == ProcedureState::Loading)?;
        transitions.get(loading_at + 1).map(|(s, _)| *s)
    }

    pub async fn run(&self, pid: Pid, call: ArgCapture, force_start: bool) -> SecResult<()> {
        let state = self.registry.lock().state_of(pid)?;
        if state != ProcedureState::Ready {
            return Err(SecError::BadState { pid, actual: state, expected: vec![ProcedureState::Ready] });
        }
        if !force_start {
            if let Some(running) = self.registry.lock().running_pid() {
                if running != pid {
                    return Err(SecError::Busy { running, requested: pid });
                }
            }
        }
        let worker = self.worker_handle(pid)?;
        self.registry.lock().push_arg_capture(pid, call.clone())?;
        if !worker.inbox.put(WorkItem::Run { call, force_start }, ENQUEUE_TIMEOUT) {
            return Err(SecError::Io(format!("inbox closed for procedure {pid}")));
        }
        Ok(())
    }

    /// Cooperative-then-forceful termination (§4.3 `stop`): SIGTERM,
    /// short join wait, retry up to `stop_max_retries` times.
    pub async fn stop(&self, pid: Pid) -> SecResult<()> {
        let state = self.registry.lock().state_of(pid)?;
        if !state.is_stoppable() {
            return Err(SecError::BadState {
                pid,
                actual: state,
                expected: vec![
                    ProcedureState::Idle,
                    ProcedureState::Loading,
                    ProcedureState::Ready,
                    ProcedureState::Running,
                ],
            });
        }

        let Some(worker) = self.workers.lock().get(&pid).cloned() else {
            return self.finish_stop(pid);
        };
        let Some(os_pid) = worker.os_pid() else {
            return self.finish_stop(pid);
        };

        for attempt in 1..=self.config.stop_max_retries {
            send_sigterm(pid, os_pid);
            if worker.wait_exited(Duration::from_millis(self.config.stop_retry_timeout_ms)).await {
                worker.close_inbox();
                self.workers.lock().remove(&pid);
                return self.finish_stop(pid);
            }
            debug!(pid, attempt, "worker did not exit after SIGTERM, retrying");
        }

        warn!(pid, "worker did not terminate after retries, abandoning to UNKNOWN");
        let now = self.clock.epoch_ms();
        self.registry.lock().record_transition(pid, ProcedureState::Unknown, now)?;
        Err(SecError::TerminationFailed(pid))
    }

    /// Record `STOPPED` once the Worker has exited. A no-op if the Worker
    /// already self-reported a terminal state (e.g. `FAILED` from a
    /// `stop(run_abort=false)` that raced an `on_progress` abort inside the
    /// running script) — mirrors `handle_fatal`'s terminal-absorption guard
    /// so the two writers can never layer a second terminal state on top of
    /// the first.
    fn finish_stop(&self, pid: Pid) -> SecResult<()> {
        let already_terminal = self.registry.lock().state_of(pid).map(|s| s.is_terminal()).unwrap_or(true);
        if already_terminal {
            return Ok(());
        }
        let now = self.clock.epoch_ms();
        self.registry.lock().record_transition(pid, ProcedureState::Stopped, now)
    }

    pub fn summarise(&self, pids: Option<&[Pid]>) -> SecResult<Vec<ProcedureSummary>> {
        self.registry.lock().summaries(pids)
    }

    pub fn state_of(&self, pid: Pid) -> SecResult<ProcedureState> {
        self.registry.lock().state_of(pid)
    }

    /// The full transition history recorded so far, used by the SES to
    /// backfill its own read-side cache at `create()` time without
    /// holding a direct handle into the registry (§9 design note).
    pub fn history_of(&self, pid: Pid) -> SecResult<Vec<(ProcedureState, u64)>> {
        self.registry.lock().get(pid).map(|p| p.history.transitions.clone()).ok_or(SecError::NotFound(pid))
    }

    /// Stop the outbox consumer, terminate every surviving Worker, and
    /// close the outbox.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.consumer.lock().take() {
            handle.abort();
        }
        let workers: Vec<(Pid, Arc<WorkerProcess>)> = self.workers.lock().drain().collect();
        for (pid, worker) in workers {
            if let Some(os_pid) = worker.os_pid() {
                send_sigterm(pid, os_pid);
            }
            worker.close_inbox();
        }
        self.outbox.close();
    }

    fn worker_handle(&self, pid: Pid) -> SecResult<Arc<WorkerProcess>> {
        self.workers.lock().get(&pid).cloned().ok_or(SecError::NotFound(pid))
    }

    fn terminate_worker(&self, pid: Pid) {
        if let Some(worker) = self.workers.lock().remove(&pid) {
            if let Some(os_pid) = worker.os_pid() {
                send_sigterm(pid, os_pid);
            }
            worker.close_inbox();
        }
    }

    fn handle_statechange(&self, source: &str, kwargs: &Kwargs) {
        let Ok(pid) = source.parse::<Pid>() else {
            return;
        };
        let Some(new_state) = kwargs.get("new_state").and_then(|v| v.as_str()).and_then(ProcedureState::parse)
        else {
            warn!(source, "statechange event missing a recognised new_state");
            return;
        };
        // Terminal absorption: a statechange that drains through the outbox
        // after `finish_stop` already recorded the Worker's exit must not
        // overwrite it (§8 property 3). The reverse ordering is guarded in
        // `finish_stop` itself.
        let already_terminal = self.registry.lock().state_of(pid).map(|s| s.is_terminal()).unwrap_or(true);
        if already_terminal {
            return;
        }
        let now = self.clock.epoch_ms();
        if let Err(err) = self.registry.lock().record_transition(pid, new_state, now) {
            warn!(pid, %err, "statechange for unknown procedure");
            return;
        }
        if new_state.is_terminal() {
            self.evict_worker(pid);
        }
    }

    fn handle_stacktrace(&self, source: &str, kwargs: &Kwargs) {
        let Ok(pid) = source.parse::<Pid>() else {
            return;
        };
        let Some(stacktrace) = kwargs.get("stacktrace").and_then(|v| v.as_str()) else {
            return;
        };
        let _ = self.registry.lock().set_stacktrace(pid, stacktrace);
    }

    /// §4.3 FATAL handling: synthesise `FAILED` + stacktrace from a bare
    /// `FATAL`. A no-op if the Worker already reported its own terminal
    /// state — the common case is that this runs right after the
    /// Worker's own `statechange`/`stacktrace` pair, as a fallback for
    /// Workers that crash before managing to publish either.
    fn handle_fatal(&self, source: &str, message: &str) {
        let Ok(pid) = source.parse::<Pid>() else {
            return;
        };
        let already_terminal = self.registry.lock().state_of(pid).map(|s| s.is_terminal()).unwrap_or(true);
        if already_terminal {
            return;
        }
        error!(pid, message, "synthesising FAILED from a bare FATAL");
        let now = self.clock.epoch_ms();
        let _ = self.registry.lock().record_transition(pid, ProcedureState::Failed, now);
        let _ = self.registry.lock().set_stacktrace(pid, message.to_string());
        self.evict_worker(pid);
    }

    fn evict_worker(&self, pid: Pid) {
        if let Some(worker) = self.workers.lock().remove(&pid) {
            worker.close_inbox();
        }
    }

    fn fan_out_to_workers(&self, msg: &EventMessage) {
        let inboxes: Vec<(String, Queue<WorkItem>)> =
            self.workers.lock().iter().map(|(pid, w)| (pid.to_string(), w.inbox.clone())).collect();
        sec_eventbus::fan_out(msg, &inboxes);
    }
}

/// The outbox consumer loop (§4.3 pseudocode), run as a detached
/// `tokio::task` per Worker process for the lifetime of the Supervisor.
async fn run_outbox_consumer<C: Clock + 'static>(supervisor: Arc<Supervisor<C>>) {
    loop {
        let Some(msg) = supervisor.outbox.try_get(Duration::ZERO) else {
            tokio::time::sleep(OUTBOX_POLL).await;
            continue;
        };
        match &msg.kind {
            EventKind::End | EventKind::Shutdown => break,
            EventKind::Fatal { message } => supervisor.handle_fatal(&msg.source, message),
            EventKind::Pubsub { topic, kwargs } => {
                supervisor.bridge.republish_from_outbox(&msg);
                match Topic::parse(topic) {
                    Some(Topic::ProcedureLifecycleStatechange) => supervisor.handle_statechange(&msg.source, kwargs),
                    Some(Topic::ProcedureLifecycleStacktrace) => supervisor.handle_stacktrace(&msg.source, kwargs),
                    _ => {}
                }
                supervisor.fan_out_to_workers(&msg);
            }
        }
    }
    debug!("outbox consumer exiting");
}

fn send_sigterm(pid: Pid, os_pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid as NixPid;
    if let Err(err) = kill(NixPid::from_raw(os_pid as i32), Signal::SIGTERM) {
        warn!(pid, os_pid, %err, "failed to signal worker process");
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;

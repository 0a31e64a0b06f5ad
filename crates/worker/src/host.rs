// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Worker main loop (§4.2): serve work items from the inbox, drive
//! the local script through its lifecycle, publish state changes to the
//! outbox.
//!
//! Grounded on `QueueProcWorker.main_loop`/`main_func`: block on the
//! inbox with a short timeout, dispatch whatever arrives, exit on the
//! `END` sentinel or after a successful `main` call.

use std::collections::HashMap;
use std::time::Duration;

use sec_core::{EventKind, Pid, ProcedureState, Topic, WorkItem};
use sec_eventbus::{Bridge, TopicBus};
use sec_queue::{Queue, ShutdownFlag};
use tracing::{debug, error, info};

use crate::script_host::{CallError, ScriptHost};

const INBOX_POLL: Duration = Duration::from_millis(20);
const OUTBOX_PUT_TIMEOUT: Duration = Duration::from_secs(5);

/// Drives one Procedure's script for the lifetime of its Worker process.
pub struct WorkerHost {
    identity: String,
    inbox: Queue<WorkItem>,
    outbox: Queue<sec_core::EventMessage>,
    bridge: Bridge,
    script: ScriptHost,
    state: ProcedureState,
    shutdown: ShutdownFlag,
}

impl WorkerHost {
    pub fn new(
        pid: Pid,
        inbox: Queue<WorkItem>,
        outbox: Queue<sec_core::EventMessage>,
        shutdown: ShutdownFlag,
    ) -> Self {
        let identity = pid.to_string();
        let bus = TopicBus::new();
        let bridge = Bridge::new(identity.clone(), bus, outbox.clone());
        bridge.install();
        let script = ScriptHost::new(shutdown.clone());
        Self {
            identity,
            inbox,
            outbox,
            bridge,
            script,
            state: ProcedureState::Unknown,
            shutdown,
        }
    }

    pub fn state(&self) -> ProcedureState {
        self.state
    }

    /// Run until the shutdown flag is set, the `END` sentinel arrives, or
    /// the script completes/fails.
    pub fn run(&mut self) {
        info!(identity = %self.identity, "worker starting");
        self.publish_state(ProcedureState::Creating);
        self.publish_state(ProcedureState::Idle);

        while !self.shutdown.is_set() {
            let Some(item) = self.inbox.try_get(INBOX_POLL) else {
                continue;
            };
            debug!(identity = %self.identity, kind = item.label(), "dispatching work item");
            if self.dispatch(item) {
                break;
            }
        }
        info!(identity = %self.identity, state = %self.state, "worker main loop exited");
    }

    /// Returns `true` if the Worker should stop its main loop.
    fn dispatch(&mut self, item: WorkItem) -> bool {
        match item {
            WorkItem::End => true,
            WorkItem::Env => {
                self.handle_env();
                false
            }
            WorkItem::Load { script } => {
                self.handle_load(&script);
                self.state.is_terminal()
            }
            WorkItem::Run { call, .. } => self.handle_run(call),
            WorkItem::Pubsub { .. } => {
                self.bridge.dispatch_inbox_item(&item);
                false
            }
        }
    }

    fn handle_env(&mut self) {
        debug!(identity = %self.identity, "ENV preparation is out of scope, treating as ready");
    }

    fn handle_load(&mut self, script: &sec_core::Script) {
        self.publish_state(ProcedureState::Loading);
        match self.script.load(script) {
            Ok(()) => self.publish_state(ProcedureState::Idle),
            Err(err) => self.fail(err.to_string()),
        }
    }

    /// Returns `true` if the Worker should stop its main loop.
    fn handle_run(&mut self, call: sec_core::ArgCapture) -> bool {
        if call.function_name == "init" && !self.script.has_function("init") {
            self.publish_state(ProcedureState::Ready);
            return false;
        }

        self.publish_state(ProcedureState::Running);
        match self.script.call(&call) {
            Ok(_value) if call.function_name == "main" => {
                self.publish_state(ProcedureState::Complete);
                true
            }
            Ok(_value) => {
                self.publish_state(ProcedureState::Ready);
                false
            }
            Err(CallError::Terminated) => {
                info!(identity = %self.identity, "script call interrupted by shutdown request");
                self.publish_state(ProcedureState::Stopped);
                true
            }
            Err(CallError::Failed(stacktrace)) => {
                self.fail(stacktrace);
                true
            }
        }
    }

    fn fail(&mut self, stacktrace: String) {
        error!(identity = %self.identity, %stacktrace, "script execution failed");
        self.publish_state(ProcedureState::Failed);
        self.publish_stacktrace(&stacktrace);
        self.emit_fatal(stacktrace);
    }

    fn publish_state(&mut self, new_state: ProcedureState) {
        self.state = new_state;
        let mut kwargs = HashMap::new();
        kwargs.insert("new_state".to_string(), serde_json::json!(new_state.to_string()));
        self.bridge.publish_local(Topic::ProcedureLifecycleStatechange, kwargs);
    }

    fn publish_stacktrace(&mut self, stacktrace: &str) {
        let mut kwargs = HashMap::new();
        kwargs.insert("stacktrace".to_string(), serde_json::json!(stacktrace));
        self.bridge.publish_local(Topic::ProcedureLifecycleStacktrace, kwargs);
    }

    fn emit_fatal(&mut self, message: String) {
        let evt = self.bridge.envelope(EventKind::Fatal { message });
        if !self.outbox.put(evt, OUTBOX_PUT_TIMEOUT) {
            error!(identity = %self.identity, "outbox closed, could not deliver FATAL event");
        }
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Script Execution Service (§4.5): a thin application-layer facade
//! in front of the Process Manager, exposed to external callers over the
//! `request.procedure.*`/`procedure.lifecycle.*` topic pairs (§6).
//!
//! Grounded on the Process Manager's own operation shapes
//! (`sec-manager::Supervisor::{create,run,stop,summarise}`); the SES
//! adds the waiting-for-readiness and abort-follow-on behaviour the
//! Process Manager itself does not know about.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use sec_core::{
    ArgCapture, Clock, Pid, PrepareProcessCommand, ProcedureState, ProcedureSummary, Script,
    SecError, SecResult, StartProcessCommand, StopProcessCommand, SupervisorConfig, Topic,
};
use sec_eventbus::{Kwargs, TopicBus};
use sec_manager::Supervisor;
use tracing::{debug, warn};

use crate::cache::Cache;

pub struct Ses<C: Clock + 'static> {
    supervisor: Arc<Supervisor<C>>,
    bus: TopicBus,
    cache: Cache,
    clock: C,
    abort_script: Option<Script>,
    ready_timeout: Duration,
    running_timeout: Duration,
}

impl<C: Clock + 'static> Ses<C> {
    /// Build the SES and install its statechange/stacktrace listeners.
    /// Call [`Ses::serve`] separately to additionally handle the
    /// `request.procedure.*` topics — unit tests usually want the
    /// former without the latter.
    pub fn new(
        supervisor: Arc<Supervisor<C>>,
        clock: C,
        config: &SupervisorConfig,
        abort_script: Option<Script>,
    ) -> Arc<Self> {
        let bus = supervisor.bus().clone();
        let ses = Arc::new(Self {
            supervisor,
            bus,
            cache: Cache::new(config.retention),
            clock,
            abort_script,
            ready_timeout: Duration::from_millis(config.startup_timeout_ms),
            running_timeout: Duration::from_millis(config.startup_timeout_ms),
        });
        ses.install_cache_listeners();
        ses
    }

    fn install_cache_listeners(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.bus.subscribe(Topic::ProcedureLifecycleStatechange, move |source, _topic, kwargs| {
            let Some(this) = weak.upgrade() else { return };
            this.on_statechange(source, kwargs);
        });

        let weak: Weak<Self> = Arc::downgrade(self);
        self.bus.subscribe(Topic::ProcedureLifecycleStacktrace, move |source, _topic, kwargs| {
            let Some(this) = weak.upgrade() else { return };
            this.on_stacktrace(source, kwargs);
        });
    }

    fn on_statechange(&self, source: &str, kwargs: &Kwargs) {
        let Ok(pid) = source.parse::<Pid>() else { return };
        let Some(new_state) =
            kwargs.get("new_state").and_then(|v| v.as_str()).and_then(ProcedureState::parse)
        else {
            return;
        };
        self.cache.record_transition(pid, new_state, self.clock.epoch_ms());
    }

    fn on_stacktrace(&self, source: &str, kwargs: &Kwargs) {
        let Ok(pid) = source.parse::<Pid>() else { return };
        if let Some(stacktrace) = kwargs.get("stacktrace").and_then(|v| v.as_str()) {
            self.cache.set_stacktrace(pid, stacktrace);
        }
    }

    /// `prepare` (§4.5): create the Procedure, then wait for its
    /// lifecycle to settle on `READY` (or fail).
    pub async fn prepare(&self, cmd: PrepareProcessCommand) -> SecResult<ProcedureSummary> {
        let PrepareProcessCommand { script, init_args } = cmd;
        let pid = self.supervisor.create(script.clone(), init_args.clone()).await?;
        let history = self.supervisor.history_of(pid).unwrap_or_default();
        self.cache.seed(pid, script, init_args, history);

        match self.cache.await_state(pid, |s| s == ProcedureState::Ready, self.ready_timeout).await {
            Some(ProcedureState::Ready) => self.cache.summary(pid).ok_or(SecError::NotFound(pid)),
            Some(ProcedureState::Failed) => Err(SecError::ScriptExecutionError {
                stacktrace: self.cache.stacktrace(pid).unwrap_or_default(),
            }),
            Some(other) => {
                Err(SecError::BadState { pid, actual: other, expected: vec![ProcedureState::Ready] })
            }
            None => Err(SecError::StartupTimeout(pid)),
        }
    }

    /// `start` (§4.5): non-blocking `run`, but returns once the Worker's
    /// `RUNNING` transition is observed.
    pub async fn start(&self, cmd: StartProcessCommand) -> SecResult<ProcedureSummary> {
        let pid = cmd.pid;
        let force_start = cmd.force_start;
        let capture = cmd.into_capture(self.clock.epoch_ms());
        self.supervisor.run(pid, capture.clone(), force_start).await?;
        self.cache.push_arg_capture(pid, capture);

        match self.cache.await_state(pid, |s| s == ProcedureState::Running, self.running_timeout).await {
            Some(ProcedureState::Running) => self.cache.summary(pid).ok_or(SecError::NotFound(pid)),
            Some(other) if other.is_terminal() => {
                Err(SecError::BadState { pid, actual: other, expected: vec![ProcedureState::Running] })
            }
            _ => Err(SecError::StartupTimeout(pid)),
        }
    }

    /// `stop` (§4.5): stop the Procedure, then — if `run_abort` is set
    /// and an abort script is configured — prepare and start it with the
    /// sub-array identifier recovered from the stopped Procedure's
    /// recorded `init` kwargs. The returned list is empty unless an
    /// abort Procedure actually ran.
    pub async fn stop(&self, cmd: StopProcessCommand) -> SecResult<Vec<ProcedureSummary>> {
        self.supervisor.stop(cmd.pid).await?;
        if !cmd.run_abort {
            return Ok(Vec::new());
        }
        let Some(abort_script) = self.abort_script.clone() else {
            debug!(pid = cmd.pid, "run_abort requested but no abort script is configured");
            return Ok(Vec::new());
        };

        let mut keyword_args = HashMap::new();
        if let Some(subarray_id) =
            self.cache.init_capture(cmd.pid).and_then(|c| c.keyword_str("subarray_id").map(str::to_string))
        {
            keyword_args.insert("subarray_id".to_string(), serde_json::json!(subarray_id));
        } else {
            warn!(pid = cmd.pid, "stopped procedure had no recorded subarray_id for abort follow-on");
        }
        let init_args = ArgCapture::new("init", self.clock.epoch_ms()).with_keyword(keyword_args);

        let prepared = self.prepare(PrepareProcessCommand { script: abort_script, init_args }).await?;
        let started = self.start(StartProcessCommand::main(prepared.pid).force_start(true)).await?;
        Ok(vec![started])
    }

    /// `summarise` (§4.5): snapshot from the SES's own cache, never the
    /// Process Manager's registry directly.
    pub fn summarise(&self, pids: Option<Vec<Pid>>) -> SecResult<Vec<ProcedureSummary>> {
        self.cache.summaries(pids.as_deref())
    }

    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await;
    }

    /// Wire the four `request.procedure.*` topics (§6) to this SES's
    /// operations, each reply published on its paired
    /// `procedure.lifecycle.*`/`procedure.pool.list` topic and tagged
    /// with the request's `request_id`. Call once after construction.
    pub fn serve(self: &Arc<Self>) {
        self.install_create_handler();
        self.install_list_handler();
        self.install_start_handler();
        self.install_stop_handler();
    }

    fn install_create_handler(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.bus.subscribe(Topic::RequestProcedureCreate, move |_source, _topic, kwargs| {
            let Some(this) = weak.upgrade() else { return };
            let Some(request_id) = kwargs.get("request_id").and_then(|v| v.as_u64()) else { return };
            let Some(cmd) = kwargs.get("cmd").and_then(|v| serde_json::from_value(v.clone()).ok()) else {
                this.publish_malformed(Topic::ProcedureLifecycleCreated, request_id);
                return;
            };
            tokio::spawn(async move {
                let result = this.prepare(cmd).await;
                this.publish_reply(Topic::ProcedureLifecycleCreated, request_id, result);
            });
        });
    }

    fn install_start_handler(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.bus.subscribe(Topic::RequestProcedureStart, move |_source, _topic, kwargs| {
            let Some(this) = weak.upgrade() else { return };
            let Some(request_id) = kwargs.get("request_id").and_then(|v| v.as_u64()) else { return };
            let Some(cmd) = kwargs.get("cmd").and_then(|v| serde_json::from_value(v.clone()).ok()) else {
                this.publish_malformed(Topic::ProcedureLifecycleStarted, request_id);
                return;
            };
            tokio::spawn(async move {
                let result = this.start(cmd).await;
                this.publish_reply(Topic::ProcedureLifecycleStarted, request_id, result);
            });
        });
    }

    fn install_stop_handler(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.bus.subscribe(Topic::RequestProcedureStop, move |_source, _topic, kwargs| {
            let Some(this) = weak.upgrade() else { return };
            let Some(request_id) = kwargs.get("request_id").and_then(|v| v.as_u64()) else { return };
            let Some(cmd) = kwargs.get("cmd").and_then(|v| serde_json::from_value(v.clone()).ok()) else {
                this.publish_malformed(Topic::ProcedureLifecycleStopped, request_id);
                return;
            };
            tokio::spawn(async move {
                let result = this.stop(cmd).await;
                this.publish_reply(Topic::ProcedureLifecycleStopped, request_id, result);
            });
        });
    }

    fn install_list_handler(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.bus.subscribe(Topic::RequestProcedureList, move |_source, _topic, kwargs| {
            let Some(this) = weak.upgrade() else { return };
            let Some(request_id) = kwargs.get("request_id").and_then(|v| v.as_u64()) else { return };
            let pids = kwargs
                .get("pids")
                .and_then(|v| serde_json::from_value::<Vec<Pid>>(v.clone()).ok());
            let result = this.summarise(pids);
            this.publish_reply(Topic::ProcedurePoolList, request_id, result);
        });
    }

    fn publish_reply<T: serde::Serialize>(&self, topic: Topic, request_id: u64, result: SecResult<T>) {
        let mut kwargs = Kwargs::new();
        kwargs.insert("request_id".to_string(), serde_json::json!(request_id));
        match result {
            Ok(value) => {
                kwargs.insert("result".to_string(), serde_json::json!(value));
            }
            Err(err) => {
                kwargs.insert("error".to_string(), err.to_wire());
            }
        }
        self.bus.publish("ses", topic, kwargs);
    }

    fn publish_malformed(&self, topic: Topic, request_id: u64) {
        warn!(request_id, topic = topic.as_str(), "malformed request payload");
        self.publish_reply::<()>(topic, request_id, Err(SecError::Io("malformed request payload".to_string())));
    }
}

#[cfg(test)]
impl<C: Clock + 'static> Ses<C> {
    /// Seed a cache entry directly, bypassing `prepare`'s real
    /// `supervisor.create()` call — unit tests exercise the bus-wiring
    /// and error-propagation paths without spawning a Worker process.
    pub(crate) fn test_seed(&self, pid: Pid, state: ProcedureState, timestamp_ms: u64) {
        self.cache.seed(
            pid,
            Script::filesystem("file:///test.rhai"),
            ArgCapture::new("init", 0),
            vec![(state, timestamp_ms)],
        );
    }
}

#[cfg(test)]
#[path = "ses_tests.rs"]
mod tests;

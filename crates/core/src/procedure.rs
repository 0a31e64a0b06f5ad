// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Procedure` — a unit of script execution owned by the Process Manager.

use serde::{Deserialize, Serialize};

use crate::arg_capture::ArgCapture;
use crate::history::History;
use crate::script::Script;
use crate::state::ProcedureState;

/// Procedure identity. Allocated by the Process Manager, strictly
/// increasing for the lifetime of the Supervisor (§3 invariant).
pub type Pid = u64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Procedure {
    pub pid: Pid,
    pub script: Script,
    pub arg_captures: Vec<ArgCapture>,
    pub history: History,
}

impl Procedure {
    pub fn new(pid: Pid, script: Script, init_capture: ArgCapture) -> Self {
        Self { pid, script, arg_captures: vec![init_capture], history: History::new() }
    }

    pub fn state(&self) -> ProcedureState {
        self.history.current_state()
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn push_arg_capture(&mut self, capture: ArgCapture) {
        self.arg_captures.push(capture);
    }

    /// The `init` ArgCapture, guaranteed to exist (§3 invariant).
    pub fn init_capture(&self) -> &ArgCapture {
        // Construction always seeds this; see `Procedure::new`.
        &self.arg_captures[0]
    }

    pub fn summary(&self) -> ProcedureSummary {
        ProcedureSummary {
            pid: self.pid,
            script_uri: self.script.uri().to_string(),
            state: self.state(),
            arg_captures: self.arg_captures.clone(),
            stacktrace: self.history.stacktrace.clone(),
        }
    }
}

/// Read-side snapshot returned from SES operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureSummary {
    pub pid: Pid,
    pub script_uri: String,
    pub state: ProcedureState,
    pub arg_captures: Vec<ArgCapture>,
    pub stacktrace: Option<String>,
}

#[cfg(any(test, feature = "test-support"))]
pub struct ProcedureBuilder {
    pid: Pid,
    script: Script,
    init_capture: ArgCapture,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for ProcedureBuilder {
    fn default() -> Self {
        Self {
            pid: 1,
            script: Script::filesystem("file:///test.rhai"),
            init_capture: ArgCapture::new("init", 0),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl ProcedureBuilder {
    pub fn pid(mut self, pid: Pid) -> Self {
        self.pid = pid;
        self
    }

    pub fn script(mut self, script: Script) -> Self {
        self.script = script;
        self
    }

    pub fn init_capture(mut self, capture: ArgCapture) -> Self {
        self.init_capture = capture;
        self
    }

    pub fn build(self) -> Procedure {
        Procedure::new(self.pid, self.script, self.init_capture)
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Procedure {
    pub fn builder() -> ProcedureBuilder {
        ProcedureBuilder::default()
    }
}

#[cfg(test)]
#[path = "procedure_tests.rs"]
mod tests;

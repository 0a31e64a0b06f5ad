// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command payloads carried on the `request.procedure.*` topics (§6).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::arg_capture::ArgCapture;
use crate::procedure::Pid;
use crate::script::Script;

/// Payload of `request.procedure.create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareProcessCommand {
    pub script: Script,
    pub init_args: ArgCapture,
}

/// Payload of `request.procedure.start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartProcessCommand {
    pub pid: Pid,
    pub function_name: String,
    pub positional_args: Vec<serde_json::Value>,
    pub keyword_args: HashMap<String, serde_json::Value>,
    pub force_start: bool,
}

impl StartProcessCommand {
    /// The §4.2 entry point, called with no arguments and `force_start=false`.
    pub fn main(pid: Pid) -> Self {
        Self {
            pid,
            function_name: "main".to_string(),
            positional_args: Vec::new(),
            keyword_args: HashMap::new(),
            force_start: false,
        }
    }

    pub fn force_start(mut self, force: bool) -> Self {
        self.force_start = force;
        self
    }

    /// Build the `ArgCapture` this command records onto the Procedure's
    /// history, stamped with the caller-supplied timestamp.
    pub fn into_capture(self, timestamp_ms: u64) -> ArgCapture {
        ArgCapture::new(self.function_name, timestamp_ms)
            .with_positional(self.positional_args)
            .with_keyword(self.keyword_args)
    }
}

/// Payload of `request.procedure.stop`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StopProcessCommand {
    pub pid: Pid,
    pub run_abort: bool,
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;

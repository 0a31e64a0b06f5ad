// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ArgCapture` — the recorded arguments of one script function invocation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Arguments provided to a single named function call on a Procedure's
/// script: once for `init`, and again for every subsequent `run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgCapture {
    pub function_name: String,
    pub positional_args: Vec<serde_json::Value>,
    pub keyword_args: HashMap<String, serde_json::Value>,
    pub timestamp_ms: u64,
}

impl ArgCapture {
    pub fn new(function_name: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            function_name: function_name.into(),
            positional_args: Vec::new(),
            keyword_args: HashMap::new(),
            timestamp_ms,
        }
    }

    pub fn with_positional(mut self, args: Vec<serde_json::Value>) -> Self {
        self.positional_args = args;
        self
    }

    pub fn with_keyword(mut self, kwargs: HashMap<String, serde_json::Value>) -> Self {
        self.keyword_args = kwargs;
        self
    }

    /// Look up a keyword argument as a string, the shape `stop(run_abort=true)`'s
    /// abort follow-on uses to recover `subarray_id` from the `init` capture.
    pub fn keyword_str(&self, key: &str) -> Option<&str> {
        self.keyword_args.get(key).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
#[path = "arg_capture_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `WorkItem` — units routed to a specific Worker's inbox.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::arg_capture::ArgCapture;
use crate::script::Script;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WorkItem {
    Env,
    Load { script: Script },
    Run { call: ArgCapture, force_start: bool },
    Pubsub { source: String, topic: String, kwargs: HashMap<String, serde_json::Value> },
    End,
}

impl WorkItem {
    pub fn run(call: ArgCapture) -> Self {
        Self::Run { call, force_start: false }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Env => "ENV",
            Self::Load { .. } => "LOAD",
            Self::Run { .. } => "RUN",
            Self::Pubsub { .. } => "PUBSUB",
            Self::End => "END",
        }
    }
}

#[cfg(test)]
#[path = "work_item_tests.rs"]
mod tests;

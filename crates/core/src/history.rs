// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only lifecycle history for a Procedure.

use serde::{Deserialize, Serialize};

use crate::state::ProcedureState;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub transitions: Vec<(ProcedureState, u64)>,
    pub stacktrace: Option<String>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transition. Callers are expected to have already validated
    /// the transition via `ProcedureState::can_transition_to`.
    pub fn push(&mut self, state: ProcedureState, timestamp_ms: u64) {
        self.transitions.push((state, timestamp_ms));
    }

    pub fn current_state(&self) -> ProcedureState {
        self.transitions.last().map(|(s, _)| *s).unwrap_or(ProcedureState::Unknown)
    }

    pub fn terminal_at(&self) -> Option<u64> {
        self.transitions.last().and_then(|(s, t)| s.is_terminal().then_some(*t))
    }

    pub fn set_stacktrace(&mut self, stacktrace: impl Into<String>) {
        self.stacktrace = Some(stacktrace.into());
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;

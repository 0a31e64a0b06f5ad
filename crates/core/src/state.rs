// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-Procedure lifecycle state machine.

use serde::{Deserialize, Serialize};

/// Script execution lifecycle state. See the state diagram in the
/// component design for the full set of valid transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcedureState {
    Unknown,
    Creating,
    Idle,
    Loading,
    Ready,
    Running,
    Complete,
    Stopped,
    Failed,
}

crate::simple_display! {
    ProcedureState {
        Unknown => "UNKNOWN",
        Creating => "CREATING",
        Idle => "IDLE",
        Loading => "LOADING",
        Ready => "READY",
        Running => "RUNNING",
        Complete => "COMPLETE",
        Stopped => "STOPPED",
        Failed => "FAILED",
    }
}

impl ProcedureState {
    /// Terminal states absorb: once entered, no further transition is recorded.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Stopped | Self::Unknown)
    }

    /// States from which `stop()` is accepted.
    pub fn is_stoppable(self) -> bool {
        matches!(self, Self::Idle | Self::Loading | Self::Ready | Self::Running)
    }

    /// Parse the wire representation written by `Display` back into a state.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UNKNOWN" => Some(Self::Unknown),
            "CREATING" => Some(Self::Creating),
            "IDLE" => Some(Self::Idle),
            "LOADING" => Some(Self::Loading),
            "READY" => Some(Self::Ready),
            "RUNNING" => Some(Self::Running),
            "COMPLETE" => Some(Self::Complete),
            "STOPPED" => Some(Self::Stopped),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether `new` is a legal transition from `self` per the §4.2 state diagram.
    pub fn can_transition_to(self, new: Self) -> bool {
        use ProcedureState::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, new),
            (Creating, Idle)
                | (Idle, Loading)
                | (Loading, Idle)
                | (Loading, Failed)
                | (Idle, Ready)
                | (Idle, Running)
                | (Ready, Running)
                | (Running, Ready)
                | (Running, Complete)
                | (Running, Failed)
                | (_, Stopped)
                | (_, Unknown)
        )
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;

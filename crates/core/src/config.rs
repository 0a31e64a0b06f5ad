// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor configuration. Loading the TOML file itself is an
//! out-of-scope collaborator; this struct only owns the parsed shape
//! and the literal defaults named throughout §4.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Maximum number of terminated Procedures retained (§3 retention policy).
    pub retention: usize,
    /// Worker startup budget in milliseconds (§4.3 `create`).
    pub startup_timeout_ms: u64,
    /// `stop()` SIGTERM retry count (§4.3 `stop`).
    pub stop_max_retries: u32,
    /// Delay between SIGTERM retries, milliseconds.
    pub stop_retry_timeout_ms: u64,
    /// Default correlator timeout (§4.6), milliseconds.
    pub correlator_timeout_ms: u64,
    /// Consecutive SIGTERM/SIGINT deliveries before abrupt teardown (§4.1).
    pub shutdown_escalation_count: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            retention: 10,
            startup_timeout_ms: 3_000,
            stop_max_retries: 3,
            stop_retry_timeout_ms: 100,
            correlator_timeout_ms: 10_000,
            shutdown_escalation_count: 3,
        }
    }
}

impl SupervisorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

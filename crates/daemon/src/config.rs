// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon-level configuration: the [`sec_core::SupervisorConfig`] plus the
//! handful of settings that only matter to the process entry point itself
//! (log directory, optional abort script). Loading the TOML file from disk
//! is this binary's job; the out-of-scope configuration-file loader named
//! in §1 is whatever external tooling writes that file.

use std::path::PathBuf;

use sec_core::{SupervisorConfig, Script};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    #[serde(flatten)]
    pub supervisor: SupervisorConfig,
    /// Directory non-blocking file logs are written under. `None` logs to stderr.
    pub log_dir: Option<PathBuf>,
    /// Script run as the abort follow-on of `stop(run_abort=true)` (§4.5).
    pub abort_script: Option<Script>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self { supervisor: SupervisorConfig::default(), log_dir: None, abort_script: None }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
}

impl DaemonConfig {
    /// Load from a TOML file, or the literal defaults if `path` is `None`.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Script identity — everything needed to fetch and load a user script.

use serde::{Deserialize, Serialize};

/// Where a script's source lives. Fetching is an out-of-scope collaborator;
/// this type only carries the addressing information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Script {
    Filesystem { uri: String },
    Repo { uri: String, revision: Option<String>, branch: Option<String>, build_env: bool },
}

impl Script {
    pub fn filesystem(uri: impl Into<String>) -> Self {
        Self::Filesystem { uri: uri.into() }
    }

    pub fn uri(&self) -> &str {
        match self {
            Self::Filesystem { uri } => uri,
            Self::Repo { uri, .. } => uri,
        }
    }

    /// Whether the Worker must run an `ENV` work item before `LOAD`.
    pub fn needs_build_env(&self) -> bool {
        matches!(self, Self::Repo { build_env: true, .. })
    }
}

#[cfg(test)]
#[path = "script_tests.rs"]
mod tests;

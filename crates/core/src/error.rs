// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error kinds shared across the script execution core.

use thiserror::Error;

use crate::state::ProcedureState;

/// Errors surfaced by the Process Manager, SES, and correlator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SecError {
    #[error("procedure {0} not found")]
    NotFound(u64),

    #[error("procedure {pid} is {actual:?}, expected one of {expected:?}")]
    BadState { pid: u64, actual: ProcedureState, expected: Vec<ProcedureState> },

    #[error("procedure {running} is running; cannot start {requested}")]
    Busy { running: u64, requested: u64 },

    #[error("worker for procedure {0} did not report idle within the startup budget")]
    StartupTimeout(u64),

    #[error("script could not be loaded: {0}")]
    ScriptLoadError(String),

    #[error("script execution failed: {stacktrace}")]
    ScriptExecutionError { stacktrace: String },

    #[error("failed to terminate procedure {0} after exhausting retries")]
    TerminationFailed(u64),

    #[error("gateway timeout waiting for response to request {0}")]
    GatewayTimeout(u64),

    #[error("wire protocol error: {0}")]
    Wire(String),

    #[error("i/o error: {0}")]
    Io(String),

    /// A recoverable error re-raised on the caller's side of the
    /// correlator (§7 propagation policy) after crossing the
    /// request/response topic pair. Carries the original kind name and
    /// message; the original variant's fields do not survive the trip.
    #[error("remote error ({kind}): {message}")]
    Remote { kind: String, message: String },
}

impl SecError {
    /// Stable discriminant name, used for the correlator's wire encoding.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SecError::NotFound(_) => "NotFound",
            SecError::BadState { .. } => "BadState",
            SecError::Busy { .. } => "Busy",
            SecError::StartupTimeout(_) => "StartupTimeout",
            SecError::ScriptLoadError(_) => "ScriptLoadError",
            SecError::ScriptExecutionError { .. } => "ScriptExecutionError",
            SecError::TerminationFailed(_) => "TerminationFailed",
            SecError::GatewayTimeout(_) => "GatewayTimeout",
            SecError::Wire(_) => "Wire",
            SecError::Io(_) => "Io",
            SecError::Remote { .. } => "Remote",
        }
    }

    /// Encode as the `{kind, message}` exception payload carried on an
    /// SES response topic (§7 propagation policy).
    pub fn to_wire(&self) -> serde_json::Value {
        serde_json::json!({ "kind": self.kind_name(), "message": self.to_string() })
    }

    /// Decode a wire exception payload back into a `SecError::Remote`,
    /// the shape the correlator re-raises to its caller.
    pub fn from_wire(value: &serde_json::Value) -> Self {
        let kind = value.get("kind").and_then(|v| v.as_str()).unwrap_or("Unknown").to_string();
        let message =
            value.get("message").and_then(|v| v.as_str()).unwrap_or("unknown remote error").to_string();
        SecError::Remote { kind, message }
    }
}

impl From<std::io::Error> for SecError {
    fn from(e: std::io::Error) -> Self {
        SecError::Io(e.to_string())
    }
}

pub type SecResult<T> = Result<T, SecError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `EventMessage` — the inter-process envelope carried on the outbox and
//! on every Worker's inbox.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A pub/sub message carried between processes.
///
/// `id` mirrors the source's monotonic nanosecond timestamp convention used
/// for request correlation; it is not a sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: f64,
    pub source: String,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    #[serde(rename = "PUBSUB")]
    Pubsub { topic: String, kwargs: HashMap<String, serde_json::Value> },
    #[serde(rename = "FATAL")]
    Fatal { message: String },
    #[serde(rename = "END")]
    End,
    #[serde(rename = "SHUTDOWN")]
    Shutdown,
}

impl EventMessage {
    pub fn pubsub(
        source: impl Into<String>,
        id: f64,
        topic: impl Into<String>,
        kwargs: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self { id, source: source.into(), kind: EventKind::Pubsub { topic: topic.into(), kwargs } }
    }

    pub fn fatal(source: impl Into<String>, id: f64, message: impl Into<String>) -> Self {
        Self { id, source: source.into(), kind: EventKind::Fatal { message: message.into() } }
    }

    pub fn end(source: impl Into<String>, id: f64) -> Self {
        Self { id, source: source.into(), kind: EventKind::End }
    }

    pub fn shutdown(source: impl Into<String>, id: f64) -> Self {
        Self { id, source: source.into(), kind: EventKind::Shutdown }
    }

    /// Loop-prevention rule (§4.4): discard messages whose source is our own.
    pub fn is_from(&self, identity: &str) -> bool {
        self.source == identity
    }
}

#[cfg(test)]
#[path = "event_message_tests.rs"]
mod tests;

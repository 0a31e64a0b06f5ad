// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Correlator` — turns a pair of asynchronous pub/sub topics into one
//! synchronous-looking call (§4.6).
//!
//! Grounded on the Event Bus bridge's `subscribe`/`publish` contract
//! (`sec-eventbus::TopicBus`): a one-shot listener on `response_topic`
//! plays the role the source's `CircularBuffer`/lock pair plays, but
//! implemented as a `tokio::sync::oneshot` channel, which is the natural
//! "one reader, one writer, one value" primitive in async Rust.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sec_core::{SecError, SecResult, Topic};
use sec_eventbus::{Kwargs, TopicBus};
use tokio::sync::oneshot;
use tracing::{debug, warn};

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(0);

/// A monotonic-enough nanosecond id: wall-clock nanos disambiguated by a
/// process-wide counter, so two requests issued in the same clock tick
/// still get distinct ids.
fn next_request_id() -> u64 {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos() as u64;
    let bump = REQUEST_SEQ.fetch_add(1, Ordering::Relaxed);
    nanos.wrapping_add(bump)
}

/// The request/response correlator. One instance is shared by every
/// external API handler issuing calls against a given [`TopicBus`].
pub struct Correlator {
    bus: TopicBus,
    identity: String,
    default_timeout: Duration,
}

impl Correlator {
    pub fn new(bus: TopicBus, identity: impl Into<String>, default_timeout: Duration) -> Self {
        Self { bus, identity: identity.into(), default_timeout }
    }

    /// `call_and_respond` (§4.6) using the correlator's default timeout.
    pub async fn call_and_respond(
        &self,
        request_topic: Topic,
        response_topic: Topic,
        kwargs: Kwargs,
    ) -> SecResult<Kwargs> {
        self.call_and_respond_with_timeout(request_topic, response_topic, kwargs, self.default_timeout).await
    }

    /// As [`Correlator::call_and_respond`] but with an explicit timeout,
    /// for callers (and S6's test) that need something shorter than the
    /// configured default.
    pub async fn call_and_respond_with_timeout(
        &self,
        request_topic: Topic,
        response_topic: Topic,
        mut kwargs: Kwargs,
        timeout: Duration,
    ) -> SecResult<Kwargs> {
        let request_id = next_request_id();
        kwargs.insert("request_id".to_string(), serde_json::json!(request_id));

        let (tx, rx) = oneshot::channel::<Kwargs>();
        let tx = StdMutex::new(Some(tx));
        let sub = self.bus.subscribe(response_topic, move |_source, _topic, reply| {
            if reply.get("request_id").and_then(|v| v.as_u64()) != Some(request_id) {
                return;
            }
            let sender = tx.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take();
            if let Some(sender) = sender {
                let _ = sender.send(reply.clone());
            }
        });

        debug!(request_id, topic = request_topic.as_str(), "publishing correlated request");
        self.bus.publish(&self.identity, request_topic, kwargs);

        let outcome = tokio::time::timeout(timeout, rx).await;
        self.bus.unsubscribe(sub);

        match outcome {
            Ok(Ok(reply)) => match reply.get("error") {
                Some(error) => Err(SecError::from_wire(error)),
                None => Ok(reply),
            },
            Ok(Err(_)) | Err(_) => {
                warn!(request_id, topic = response_topic.as_str(), "correlator timed out awaiting response");
                Err(SecError::GatewayTimeout(request_id))
            }
        }
    }
}

#[cfg(test)]
#[path = "correlator_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The bidirectional bridge between the local [`TopicBus`] and the
//! inter-process event plane (§4.4).
//!
//! Grounded on `EventBusWorker.republish`/`EventBusWorker.main_func`: a
//! local publish not tagged with a foreign source is serialised onto the
//! outbox; a `PUBSUB` item arriving from another process is republished
//! locally tagged with its origin, so the bridge never re-forwards its
//! own echo.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sec_core::{EventMessage, Topic, WorkItem};
use sec_queue::Queue;
use tracing::{debug, trace, warn};

use crate::local_bus::{Kwargs, SubscriptionId, TopicBus};

/// Owns one process's identity on the bus and wires it to an outbox.
pub struct Bridge {
    identity: String,
    bus: TopicBus,
    outbox: Queue<EventMessage>,
    next_message_id: Arc<AtomicU64>,
}

impl Bridge {
    pub fn new(identity: impl Into<String>, bus: TopicBus, outbox: Queue<EventMessage>) -> Self {
        Self {
            identity: identity.into(),
            bus,
            outbox,
            next_message_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    fn next_id(&self) -> f64 {
        self.next_message_id.fetch_add(1, Ordering::Relaxed) as f64
    }

    /// Publish on the local bus as ourselves. If nothing else intercepts
    /// it, the subscription installed by [`Bridge::install`] forwards it
    /// to the outbox.
    pub fn publish_local(&self, topic: Topic, kwargs: Kwargs) {
        self.bus.publish(&self.identity, topic, kwargs);
    }

    /// Subscribe the forwarding listener to every topic. Call once at
    /// startup; call [`TopicBus::unsubscribe`] with the returned id at
    /// shutdown.
    pub fn install(&self) -> SubscriptionId {
        let identity = self.identity.clone();
        let outbox = self.outbox.clone();
        let next_message_id = self.next_message_id.clone();
        self.bus.subscribe_all(move |source, topic, kwargs| {
            if source != identity {
                trace!(%source, topic = topic.as_str(), "discarding foreign-origin publish");
                return;
            }
            let id = next_message_id.fetch_add(1, Ordering::Relaxed) as f64;
            let msg = EventMessage::pubsub(identity.clone(), id, topic.as_str(), kwargs.clone());
            debug!(topic = topic.as_str(), "queueing internal event for outbox");
            outbox.put(msg, std::time::Duration::from_secs(u64::MAX / 2));
        })
    }

    /// Republish a `PUBSUB` work item received on this process's inbox.
    /// `source` is the originating process's identity, carried alongside
    /// the work item by whoever delivered it.
    pub fn dispatch_inbox_item(&self, item: &WorkItem) {
        if let WorkItem::Pubsub { source, topic, kwargs } = item {
            if source == &self.identity {
                trace!(%source, "discarding internal event echoed back to us");
                return;
            }
            match Topic::parse(topic) {
                Some(topic) => {
                    debug!(%source, topic = topic.as_str(), "republishing external event locally");
                    self.bus.publish(source, topic, kwargs.clone());
                }
                None => warn!(%source, topic, "unknown topic on inbox, dropping"),
            }
        }
    }

    /// Supervisor-side counterpart of [`Bridge::dispatch_inbox_item`]:
    /// republish a `PUBSUB` event received on the outbox onto the
    /// Supervisor's own local bus, so Supervisor-side listeners (notably
    /// the correlator) observe it too.
    pub fn republish_from_outbox(&self, evt: &EventMessage) {
        if evt.source == self.identity {
            return;
        }
        if let sec_core::EventKind::Pubsub { topic, kwargs } = &evt.kind {
            match Topic::parse(topic) {
                Some(topic) => self.bus.publish(&evt.source, topic, kwargs.clone()),
                None => warn!(topic, "unknown topic on outbox event, dropping"),
            }
        }
    }

    /// Build an outbound `EventMessage` stamped with our identity and a
    /// freshly allocated id, without touching the bus. Used when a
    /// process needs to emit `FATAL`/`END`/`SHUTDOWN` envelopes directly.
    pub fn envelope(&self, kind: sec_core::EventKind) -> EventMessage {
        EventMessage { id: self.next_id(), source: self.identity.clone(), kind }
    }
}

/// Fan a `PUBSUB` event out to every other process's inbox, converting it
/// to the `WorkItem` shape each inbox queue carries. The originator is
/// skipped so it never sees its own message bounce back.
pub fn fan_out(evt: &EventMessage, inboxes: &[(String, Queue<WorkItem>)]) {
    let sec_core::EventKind::Pubsub { topic, kwargs } = &evt.kind else {
        return;
    };
    for (identity, inbox) in inboxes {
        if identity == &evt.source {
            continue;
        }
        let item = WorkItem::Pubsub {
            source: evt.source.clone(),
            topic: topic.clone(),
            kwargs: kwargs.clone(),
        };
        if !inbox.try_put(item) {
            warn!(%identity, topic, "inbox full or closed, dropping fan-out event");
        }
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;

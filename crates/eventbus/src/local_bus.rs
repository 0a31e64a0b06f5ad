// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process publish/subscribe bus.
//!
//! Grounded on `pypubsub`'s `pub.subscribe`/`pub.sendMessage`/`pub.ALL_TOPICS`:
//! callbacks register either against one topic or against every topic, and
//! a publish always carries the publisher's identity so loop-preventing
//! bridges can inspect it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use sec_core::Topic;

pub type Kwargs = HashMap<String, serde_json::Value>;
pub type Listener = Arc<dyn Fn(&str, Topic, &Kwargs) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Subscribers {
    by_topic: HashMap<Topic, Vec<(SubscriptionId, Listener)>>,
    all_topics: Vec<(SubscriptionId, Listener)>,
}

/// A cloneable handle onto one process-local topic bus.
#[derive(Clone)]
pub struct TopicBus {
    subscribers: Arc<RwLock<Subscribers>>,
    next_id: Arc<AtomicU64>,
}

impl TopicBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(Subscribers::default())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn allocate_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Subscribe to a single topic.
    pub fn subscribe(
        &self,
        topic: Topic,
        listener: impl Fn(&str, Topic, &Kwargs) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.allocate_id();
        self.subscribers.write().by_topic.entry(topic).or_default().push((id, Arc::new(listener)));
        id
    }

    /// Subscribe to every topic published on this bus, mirroring
    /// `pub.subscribe(listener, pub.ALL_TOPICS)`.
    pub fn subscribe_all(
        &self,
        listener: impl Fn(&str, Topic, &Kwargs) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.allocate_id();
        self.subscribers.write().all_topics.push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self.subscribers.write();
        subs.all_topics.retain(|(sub_id, _)| *sub_id != id);
        for listeners in subs.by_topic.values_mut() {
            listeners.retain(|(sub_id, _)| *sub_id != id);
        }
    }

    /// Publish a message. `source` is the publishing identity, propagated
    /// to every listener so bridges can recognise and discard their own
    /// echoes.
    pub fn publish(&self, source: &str, topic: Topic, kwargs: Kwargs) {
        let (topic_listeners, all_listeners) = {
            let subs = self.subscribers.read();
            let topic_listeners: Vec<Listener> =
                subs.by_topic.get(&topic).map(|v| v.iter().map(|(_, l)| l.clone()).collect()).unwrap_or_default();
            let all_listeners: Vec<Listener> =
                subs.all_topics.iter().map(|(_, l)| l.clone()).collect();
            (topic_listeners, all_listeners)
        };
        for listener in topic_listeners.iter().chain(all_listeners.iter()) {
            listener(source, topic, &kwargs);
        }
    }
}

impl Default for TopicBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "local_bus_tests.rs"]
mod tests;

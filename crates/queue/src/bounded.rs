// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded (and unbounded) FIFO queue with non-throwing put/get.
//!
//! Grounded on the `MPQueue.safe_get`/`safe_put`/`drain`/`safe_close`
//! contract: timeouts and full/closed queues are reported through return
//! values, never exceptions, so callers on a poll loop never need a
//! `catch`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

/// A FIFO queue safe to share across threads (and, once framed over the
/// wire, across OS processes — see `sec-wire`).
#[derive(Clone)]
pub struct Queue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Queue<T> {
    pub fn bounded(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State { items: VecDeque::new(), closed: false }),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                capacity,
            }),
        }
    }

    /// The outbox is unbounded by design (§5): loss is worse than memory growth.
    pub fn unbounded() -> Self {
        Self::bounded(usize::MAX)
    }

    /// Non-blocking put. Returns `false` if the queue is full or closed.
    pub fn try_put(&self, item: T) -> bool {
        let mut state = self.inner.state.lock();
        if state.closed || state.items.len() >= self.inner.capacity {
            return false;
        }
        state.items.push_back(item);
        self.inner.not_empty.notify_one();
        true
    }

    /// Blocking put with a timeout. Returns `false` on timeout or if the
    /// queue is closed while waiting.
    pub fn put(&self, item: T, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        loop {
            if state.closed {
                return false;
            }
            if state.items.len() < self.inner.capacity {
                state.items.push_back(item);
                self.inner.not_empty.notify_one();
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            self.inner.not_full.wait_for(&mut state, remaining);
        }
    }

    /// Non-throwing get with a timeout. Returns `None` on timeout, on an
    /// empty closed queue, or once the queue is drained after close.
    pub fn try_get(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                self.inner.not_full.notify_one();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            self.inner.not_empty.wait_for(&mut state, remaining);
        }
    }

    /// Drain all items currently buffered without blocking.
    pub fn drain(&self) -> Vec<T> {
        let mut state = self.inner.state.lock();
        let drained = state.items.drain(..).collect();
        self.inner.not_full.notify_all();
        drained
    }

    /// Close both ends, waking any blocked callers, and return the number
    /// of items that were never drained.
    pub fn close(&self) -> usize {
        let mut state = self.inner.state.lock();
        state.closed = true;
        let undrained = state.items.len();
        self.inner.not_empty.notify_all();
        self.inner.not_full.notify_all();
        undrained
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "bounded_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The SES's passive read-side cache (§9 design note): mirrors
//! `script_args[pid]`, `history[pid]`, `states[pid]`, and `scripts[pid]`,
//! kept current by subscribing to `procedure.lifecycle.statechange`
//! rather than by holding a direct handle onto the Process Manager's
//! registry. This is what makes the SES independently testable with a
//! fake event stream.

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::Mutex;
use sec_core::{ArgCapture, Pid, ProcedureState, ProcedureSummary, Script, SecError, SecResult};
use tokio::sync::Notify;

struct CacheEntry {
    script: Script,
    history: Vec<(ProcedureState, u64)>,
    arg_captures: Vec<ArgCapture>,
    stacktrace: Option<String>,
}

impl CacheEntry {
    fn state(&self) -> ProcedureState {
        self.history.last().map(|(s, _)| *s).unwrap_or(ProcedureState::Unknown)
    }

    fn summary(&self, pid: Pid) -> ProcedureSummary {
        ProcedureSummary {
            pid,
            script_uri: self.script.uri().to_string(),
            state: self.state(),
            arg_captures: self.arg_captures.clone(),
            stacktrace: self.stacktrace.clone(),
        }
    }
}

pub struct Cache {
    retention: usize,
    entries: Mutex<BTreeMap<Pid, CacheEntry>>,
    notify: Notify,
}

impl Cache {
    pub fn new(retention: usize) -> Self {
        Self { retention, entries: Mutex::new(BTreeMap::new()), notify: Notify::new() }
    }

    /// Seed a freshly created Procedure's entry from the authoritative
    /// history the Process Manager's registry already recorded before
    /// `create()` returned (§4.5's `prepare` backfill). If a statechange
    /// event for this pid raced ahead of the backfill, keep whichever
    /// history is longer — both are append-only prefixes of the same
    /// sequence, so the longer one is never stale.
    pub fn seed(&self, pid: Pid, script: Script, init_capture: ArgCapture, history: Vec<(ProcedureState, u64)>) {
        let mut entries = self.entries.lock();
        entries
            .entry(pid)
            .and_modify(|entry| {
                entry.script = script.clone();
                if history.len() > entry.history.len() {
                    entry.history = history.clone();
                }
            })
            .or_insert_with(|| CacheEntry {
                script,
                history,
                arg_captures: vec![init_capture],
                stacktrace: None,
            });
        drop(entries);
        self.notify.notify_waiters();
    }

    pub fn push_arg_capture(&self, pid: Pid, capture: ArgCapture) {
        if let Some(entry) = self.entries.lock().get_mut(&pid) {
            entry.arg_captures.push(capture);
        }
    }

    /// Record a transition observed on the bus. A no-op if the pid has
    /// not been seeded yet (the event raced ahead of `seed`) — `seed`'s
    /// length comparison recovers any such transition once it runs.
    pub fn record_transition(&self, pid: Pid, state: ProcedureState, timestamp_ms: u64) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(&pid) else {
            return;
        };
        entry.history.push((state, timestamp_ms));
        if state.is_terminal() {
            evict_oldest_terminal(&mut entries, self.retention);
        }
        drop(entries);
        self.notify.notify_waiters();
    }

    pub fn set_stacktrace(&self, pid: Pid, stacktrace: impl Into<String>) {
        if let Some(entry) = self.entries.lock().get_mut(&pid) {
            entry.stacktrace = Some(stacktrace.into());
        }
    }

    pub fn state_of(&self, pid: Pid) -> Option<ProcedureState> {
        self.entries.lock().get(&pid).map(CacheEntry::state)
    }

    pub fn stacktrace(&self, pid: Pid) -> Option<String> {
        self.entries.lock().get(&pid).and_then(|e| e.stacktrace.clone())
    }

    pub fn init_capture(&self, pid: Pid) -> Option<ArgCapture> {
        self.entries.lock().get(&pid).and_then(|e| e.arg_captures.first().cloned())
    }

    pub fn summary(&self, pid: Pid) -> Option<ProcedureSummary> {
        self.entries.lock().get(&pid).map(|e| e.summary(pid))
    }

    pub fn summaries(&self, pids: Option<&[Pid]>) -> SecResult<Vec<ProcedureSummary>> {
        let entries = self.entries.lock();
        match pids {
            None => Ok(entries.iter().map(|(pid, e)| e.summary(*pid)).collect()),
            Some(pids) => pids
                .iter()
                .map(|pid| entries.get(pid).map(|e| e.summary(*pid)).ok_or(SecError::NotFound(*pid)))
                .collect(),
        }
    }

    /// Block until `pid` reaches a state matching `predicate` or any
    /// terminal state, or until `timeout` elapses. Returns the settled
    /// state, or `None` on timeout.
    pub async fn await_state(
        &self,
        pid: Pid,
        predicate: impl Fn(ProcedureState) -> bool,
        timeout: Duration,
    ) -> Option<ProcedureState> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if let Some(state) = self.state_of(pid) {
                if predicate(state) || state.is_terminal() {
                    return Some(state);
                }
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return self.state_of(pid);
            }
            tokio::select! {
                _ = notified => continue,
                _ = tokio::time::sleep(remaining) => return self.state_of(pid),
            }
        }
    }
}

fn evict_oldest_terminal(entries: &mut BTreeMap<Pid, CacheEntry>, retention: usize) {
    let terminal_count = entries.values().filter(|e| e.state().is_terminal()).count();
    if terminal_count <= retention {
        return;
    }
    let victim = entries
        .iter()
        .filter(|(_, e)| e.state().is_terminal())
        .min_by_key(|(pid, e)| (e.history.last().map(|(_, t)| *t).unwrap_or(u64::MAX), **pid))
        .map(|(pid, _)| *pid);
    if let Some(pid) = victim {
        entries.remove(&pid);
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;

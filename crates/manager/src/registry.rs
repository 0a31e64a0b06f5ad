// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pid allocation, per-Procedure bookkeeping, and bounded retention (§3).
//!
//! Mutated only from the outbox consumer task (§5's single-lock
//! invariant), so this type itself does no locking — the `Supervisor`
//! wraps it in one `parking_lot::Mutex`.

use std::collections::BTreeMap;

use sec_core::{ArgCapture, Pid, Procedure, ProcedureState, ProcedureSummary, SecError, SecResult};

pub struct Registry {
    retention: usize,
    next_pid: Pid,
    procedures: BTreeMap<Pid, Procedure>,
}

impl Registry {
    pub fn new(retention: usize) -> Self {
        Self { retention, next_pid: 1, procedures: BTreeMap::new() }
    }

    pub fn allocate_pid(&mut self) -> Pid {
        let pid = self.next_pid;
        self.next_pid += 1;
        pid
    }

    pub fn insert(&mut self, procedure: Procedure) {
        self.procedures.insert(procedure.pid, procedure);
    }

    pub fn get(&self, pid: Pid) -> Option<&Procedure> {
        self.procedures.get(&pid)
    }

    pub fn state_of(&self, pid: Pid) -> SecResult<ProcedureState> {
        self.procedures.get(&pid).map(Procedure::state).ok_or(SecError::NotFound(pid))
    }

    pub fn running_pid(&self) -> Option<Pid> {
        self.procedures.values().find(|p| p.state() == ProcedureState::Running).map(|p| p.pid)
    }

    pub fn push_arg_capture(&mut self, pid: Pid, capture: ArgCapture) -> SecResult<()> {
        let procedure = self.procedures.get_mut(&pid).ok_or(SecError::NotFound(pid))?;
        procedure.push_arg_capture(capture);
        Ok(())
    }

    /// Record a lifecycle transition. Evicts the oldest terminated
    /// Procedure if this transition just pushed the terminal count over
    /// `retention`.
    pub fn record_transition(&mut self, pid: Pid, new_state: ProcedureState, timestamp_ms: u64) -> SecResult<()> {
        let procedure = self.procedures.get_mut(&pid).ok_or(SecError::NotFound(pid))?;
        procedure.history.push(new_state, timestamp_ms);
        if new_state.is_terminal() {
            self.evict_oldest_terminal();
        }
        Ok(())
    }

    pub fn set_stacktrace(&mut self, pid: Pid, stacktrace: impl Into<String>) -> SecResult<()> {
        let procedure = self.procedures.get_mut(&pid).ok_or(SecError::NotFound(pid))?;
        procedure.history.set_stacktrace(stacktrace);
        Ok(())
    }

    pub fn remove(&mut self, pid: Pid) -> Option<Procedure> {
        self.procedures.remove(&pid)
    }

    fn evict_oldest_terminal(&mut self) {
        let terminal_count = self.procedures.values().filter(|p| p.is_terminal()).count();
        if terminal_count <= self.retention {
            return;
        }
        let victim = self
            .procedures
            .values()
            .filter(|p| p.is_terminal())
            .min_by_key(|p| (p.history.terminal_at().unwrap_or(u64::MAX), p.pid))
            .map(|p| p.pid);
        if let Some(pid) = victim {
            self.procedures.remove(&pid);
        }
    }

    pub fn summaries(&self, pids: Option<&[Pid]>) -> SecResult<Vec<ProcedureSummary>> {
        match pids {
            None => Ok(self.procedures.values().map(Procedure::summary).collect()),
            Some(pids) => pids
                .iter()
                .map(|pid| self.procedures.get(pid).map(Procedure::summary).ok_or(SecError::NotFound(*pid)))
                .collect(),
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

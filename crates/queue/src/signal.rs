// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shutdown signal handling.
//!
//! Grounded on `SignalObject`/`default_signal_handler`: a single shared
//! "shutdown requested" flag is wired to SIGINT and SIGTERM. The first
//! `escalation_count - 1` deliveries just set the flag; the Nth delivery
//! runs an escalation callback that converts the request into abrupt
//! teardown. `signal-hook` is used instead of a raw `sigaction` handler
//! so no `unsafe` code is needed anywhere in this crate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("failed to register signal handlers: {0}")]
    Register(#[from] std::io::Error),
}

/// The single cooperative cancellation signal shared by every blocking
/// call in the core (§5).
#[derive(Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn raw(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

/// Spawn a background thread that escalates SIGINT/SIGTERM deliveries.
///
/// Every delivery sets `shutdown`. After `escalation_count` deliveries
/// (default 3, per §4.1), `on_escalate` runs once and the watcher thread
/// exits.
pub fn watch_shutdown_signals(
    shutdown: ShutdownFlag,
    escalation_count: u32,
    on_escalate: impl FnOnce() + Send + 'static,
) -> Result<JoinHandle<()>, SignalError> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    Ok(std::thread::spawn(move || {
        let mut received: u32 = 0;
        let mut on_escalate = Some(on_escalate);
        for signal in signals.forever() {
            shutdown.set();
            received += 1;
            info!(signal, count = received, "shutdown signal received");
            if received >= escalation_count {
                warn!(count = received, "escalation threshold reached, tearing down abruptly");
                if let Some(cb) = on_escalate.take() {
                    cb();
                }
                break;
            }
        }
    }))
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;

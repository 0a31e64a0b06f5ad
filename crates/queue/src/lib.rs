// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sec-queue: bounded/unbounded FIFO queue primitives and shutdown signal
//! handling — the leaf dependencies of the script execution core.

pub mod bounded;
pub mod signal;

pub use bounded::Queue;
pub use signal::{watch_shutdown_signals, ShutdownFlag, SignalError};

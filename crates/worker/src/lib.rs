// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! sec-worker: the script host that runs as each Procedure's child
//! process (§4.2).

pub mod host;
pub mod script_host;

pub use host::WorkerHost;
pub use script_host::{ScriptHost, ScriptHostError};

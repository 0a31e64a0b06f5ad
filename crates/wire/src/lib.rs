// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC wire protocol between the Process Manager and its Worker
//! processes.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod wire;

pub use wire::{
    decode, encode, read_frame, read_frame_sync, read_message, read_message_sync, write_frame,
    write_frame_sync, write_message, write_message_sync, ProtocolError, MAX_FRAME_BYTES,
};

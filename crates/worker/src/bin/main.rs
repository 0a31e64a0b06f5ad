// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker process entry point.
//!
//! Invoked by the Process Manager as `sec-worker <pid>`. Reads `WorkItem`
//! frames from stdin, runs them through [`sec_worker::WorkerHost`], and
//! writes `EventMessage` frames to stdout. Single-threaded apart from the
//! stdio pump threads, mirroring a Python `mp.Process` worker.

use std::io::{stdin, stdout};
use std::thread;
use std::time::Duration;

use sec_core::{EventMessage, WorkItem};
use sec_queue::{watch_shutdown_signals, Queue, ShutdownFlag};
use sec_worker::WorkerHost;
use sec_wire::{read_frame_sync, write_frame_sync};
use tracing::{error, info};

const INBOX_CAPACITY: usize = 64;

/// The first SIGTERM only sets the shutdown flag, letting the script's
/// `on_progress` check interrupt the call and publish `STOPPED` on its
/// own (§4.1's cooperative stop). Escalating on the very first delivery
/// would race that graceful path with an abrupt `process::exit`, so this
/// stays above 1 — only a script stuck somewhere `on_progress` can't
/// reach (a native blocking call) should ever need the forceful exit.
const SHUTDOWN_ESCALATION_COUNT: u32 = 3;

fn main() {
    tracing_subscriber_init();

    let pid: u64 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or_else(|| {
            error!("sec-worker requires a numeric pid argument");
            std::process::exit(2);
        });

    let inbox = Queue::bounded(INBOX_CAPACITY);
    let outbox = Queue::unbounded();
    let shutdown = ShutdownFlag::new();

    if let Err(err) = watch_shutdown_signals(shutdown.clone(), SHUTDOWN_ESCALATION_COUNT, || {
        std::process::exit(130);
    }) {
        error!(%err, "failed to install signal handlers");
    }

    let reader = spawn_stdin_reader(inbox.clone(), shutdown.clone());
    let writer = spawn_stdout_writer(outbox.clone());

    let mut host = WorkerHost::new(pid, inbox.clone(), outbox.clone(), shutdown.clone());
    host.run();

    inbox.close();
    outbox.close();
    let _ = reader.join();
    let _ = writer.join();
    info!(pid, "worker process exiting");
}

fn spawn_stdin_reader(inbox: Queue<WorkItem>, shutdown: ShutdownFlag) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut stdin = stdin().lock();
        loop {
            if shutdown.is_set() {
                break;
            }
            match read_frame_sync::<_, WorkItem>(&mut stdin) {
                Ok(item) => {
                    if !inbox.put(item, Duration::from_secs(5)) {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    })
}

fn spawn_stdout_writer(outbox: Queue<EventMessage>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut stdout = stdout().lock();
        loop {
            match outbox.try_get(Duration::from_millis(50)) {
                Some(msg) => {
                    if write_frame_sync(&mut stdout, &msg).is_err() {
                        break;
                    }
                }
                None => {
                    if outbox.is_closed() {
                        break;
                    }
                }
            }
        }
    })
}

fn tracing_subscriber_init() {
    let _ = tracing_subscriber::fmt().with_writer(std::io::stderr).try_init();
}

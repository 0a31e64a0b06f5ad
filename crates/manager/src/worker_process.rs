// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawns and pumps one Worker's OS process.
//!
//! Grounded on the teacher's `tokio::process::Command` + `Stdio::piped()`
//! subprocess idiom (`engine/executor.rs`): async spawn, async stdio, a
//! background task per pipe direction. The
//! Worker's own half is fully synchronous (`sec-worker`'s `bin/main.rs`);
//! bridging that to the Supervisor's async world happens here, not there.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sec_core::{EventMessage, Pid, WorkItem};
use sec_queue::Queue;
use sec_wire::{read_frame, write_frame, ProtocolError};
use tokio::process::{Child, Command};
use tokio::sync::Notify;
use tracing::{debug, warn};

const INBOX_POLL: Duration = Duration::from_millis(20);

/// One spawned Worker and the pump tasks ferrying frames between its
/// stdio and the shared [`Queue`]s. The pump and exit-watcher tasks are
/// detached at spawn time: they run to completion on their own once the
/// Worker closes its pipes, independent of this handle's lifetime.
pub struct WorkerProcess {
    pub pid: Pid,
    pub inbox: Queue<WorkItem>,
    os_pid: Option<u32>,
    exited: Arc<Notify>,
    has_exited: Arc<AtomicBool>,
}

impl WorkerProcess {
    /// Resolve the `sec-worker` binary. `SEC_WORKER_BIN` overrides the
    /// default sibling-of-`current_exe` lookup, for deployments that
    /// install the binary somewhere else.
    pub fn binary_path() -> std::path::PathBuf {
        if let Ok(path) = std::env::var("SEC_WORKER_BIN") {
            return std::path::PathBuf::from(path);
        }
        let mut path = std::env::current_exe().unwrap_or_else(|_| "sec-worker".into());
        path.pop();
        path.push("sec-worker");
        path
    }

    pub fn spawn(pid: Pid, inbox_capacity: usize, outbox: Queue<EventMessage>) -> std::io::Result<Self> {
        let mut child = Command::new(Self::binary_path())
            .arg(pid.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let os_pid = child.id();
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("worker child missing piped stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("worker child missing piped stdout"))?;

        let inbox = Queue::bounded(inbox_capacity);
        tokio::spawn(pump_inbox(pid, inbox.clone(), stdin));
        tokio::spawn(pump_outbox(pid, outbox.clone(), stdout));

        let exited = Arc::new(Notify::new());
        let has_exited = Arc::new(AtomicBool::new(false));
        tokio::spawn(watch_exit(pid, child, outbox, exited.clone(), has_exited.clone()));

        Ok(Self { pid, inbox, os_pid, exited, has_exited })
    }

    pub fn os_pid(&self) -> Option<u32> {
        self.os_pid
    }

    pub fn has_exited(&self) -> bool {
        self.has_exited.load(Ordering::SeqCst)
    }

    /// Wait up to `timeout` for the child to exit. Used by `stop()`'s
    /// SIGTERM retry loop.
    pub async fn wait_exited(&self, timeout: Duration) -> bool {
        if self.has_exited() {
            return true;
        }
        tokio::select! {
            _ = self.exited.notified() => true,
            _ = tokio::time::sleep(timeout) => self.has_exited(),
        }
    }

    pub fn close_inbox(&self) {
        self.inbox.close();
    }
}

async fn pump_inbox(pid: Pid, inbox: Queue<WorkItem>, mut stdin: tokio::process::ChildStdin) {
    loop {
        let Some(item) = inbox.try_get(Duration::ZERO) else {
            if inbox.is_closed() {
                break;
            }
            tokio::time::sleep(INBOX_POLL).await;
            continue;
        };
        if let Err(err) = write_frame(&mut stdin, &item).await {
            warn!(pid, %err, "failed to write work item to worker stdin");
            break;
        }
    }
    debug!(pid, "inbox pump exiting");
}

async fn pump_outbox(pid: Pid, outbox: Queue<EventMessage>, mut stdout: tokio::process::ChildStdout) {
    loop {
        match read_frame::<_, EventMessage>(&mut stdout).await {
            Ok(msg) => {
                if !outbox.try_put(msg) {
                    warn!(pid, "outbox closed, dropping event from worker");
                    break;
                }
            }
            Err(ProtocolError::Io(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(err) => {
                warn!(pid, %err, "failed to read event from worker stdout");
                break;
            }
        }
    }
    debug!(pid, "outbox pump exiting");
}

/// Safety net for §4.3's "Worker exits unexpectedly without publishing a
/// terminal state": if the child's exit status is not a clean success,
/// synthesise a `FATAL` so the outbox consumer promotes the Procedure to
/// `FAILED` even though no Worker code path ran to report it. Harmless
/// no-op if the Procedure already reached a terminal state on its own.
async fn watch_exit(
    pid: Pid,
    mut child: Child,
    outbox: Queue<EventMessage>,
    exited: Arc<Notify>,
    has_exited: Arc<AtomicBool>,
) {
    let status = child.wait().await;
    has_exited.store(true, Ordering::SeqCst);
    exited.notify_waiters();
    let clean = matches!(status, Ok(s) if s.success());
    if !clean {
        warn!(pid, ?status, "worker process exited abnormally");
        let msg = EventMessage::fatal(pid.to_string(), 0.0, format!("worker process exited: {status:?}"));
        let _ = outbox.try_put(msg);
    }
}

#[cfg(test)]
#[path = "worker_process_tests.rs"]
mod tests;

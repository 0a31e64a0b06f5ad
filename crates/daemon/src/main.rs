// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor process entry point (`secd`).
//!
//! Loads configuration, wires the Process Manager, Script Execution
//! Service, and Correlator onto one shared [`sec_eventbus::TopicBus`],
//! and blocks until SIGINT/SIGTERM (or escalated teardown after
//! `shutdown_escalation_count` consecutive deliveries, §4.1).

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sec_core::SystemClock;
use sec_manager::Supervisor;
use sec_queue::{watch_shutdown_signals, ShutdownFlag};
use sec_ses::Ses;
use tracing::{error, info};

use config::DaemonConfig;

const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match DaemonConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            let _ = tracing_subscriber::fmt().with_writer(std::io::stderr).try_init();
            error!(%err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let _log_guard = setup_logging(config.log_dir.as_deref());

    let shutdown = ShutdownFlag::new();
    if let Err(err) =
        watch_shutdown_signals(shutdown.clone(), config.supervisor.shutdown_escalation_count, || {
            error!("shutdown escalation threshold reached, tearing down abruptly");
            std::process::exit(130);
        })
    {
        error!(%err, "failed to install signal handlers");
        std::process::exit(1);
    }

    let supervisor = Supervisor::new(config.supervisor.clone(), SystemClock);
    let ses = Ses::new(supervisor.clone(), SystemClock, &config.supervisor, config.abort_script.clone());
    ses.serve();

    info!("supervisor ready");

    while !shutdown.is_set() {
        tokio::time::sleep(SHUTDOWN_POLL_INTERVAL).await;
    }

    info!("shutdown requested, tearing down");
    ses.shutdown().await;
    info!("supervisor stopped");
}

fn setup_logging(log_dir: Option<&std::path::Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            if let Err(err) = std::fs::create_dir_all(dir) {
                error!(%err, "failed to create log directory, logging to stderr instead");
                let _ = tracing_subscriber::fmt().with_writer(std::io::stderr).with_env_filter(filter()).try_init();
                return None;
            }
            let appender = tracing_appender::rolling::daily(dir, "secd.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let _ = tracing_subscriber::registry()
                .with(filter())
                .with(fmt::layer().with_writer(non_blocking))
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::fmt().with_writer(std::io::stderr).with_env_filter(filter()).try_init();
            None
        }
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event Manager Daemon (emd)
//!
//! Accepts Alertmanager webhooks, queues one event per alert, and consumes
//! the queue with a bounded number of concurrent workers.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod handler;
mod lifecycle;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::lifecycle::{Config, LifecycleError, Overrides};

#[derive(Parser, Debug)]
#[command(
    name = "emd",
    version,
    about = "Event manager daemon: webhook ingestion and bounded queue consumer"
)]
struct Args {
    /// Maximum concurrent workers (falls back to the config file, then 50)
    #[arg(allow_negative_numbers = true)]
    max_workers: Option<i64>,

    /// Config file (default: ./emd.toml, optional)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Address the webhook server listens on
    #[arg(long)]
    listen: Option<String>,

    /// Journal directory; the queue is in-memory when unset
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Upper bound on draining in-flight work at shutdown (e.g. "30s")
    #[arg(long, value_parser = humantime::parse_duration)]
    drain_timeout: Option<Duration>,

    /// Log file; logs go to stderr when unset
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl From<Args> for Overrides {
    fn from(args: Args) -> Self {
        Self {
            config_path: args.config,
            max_workers: args.max_workers,
            listen: args.listen,
            data_dir: args.data_dir,
            drain_timeout: args.drain_timeout,
            log_path: args.log_file,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration (logging is not set up yet, so report on stderr)
    let config = match Config::load(args.into()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("emd: {}", e);
            return Err(e.into());
        }
    };
    let log_path = config.settings.log_path.clone();

    // Write startup marker to log (before tracing setup, so operators can find it)
    if let Some(path) = &log_path {
        write_startup_marker(path)?;
    }

    // Set up logging
    let log_guard = setup_logging(log_path.as_deref())?;

    info!(max_workers = config.max_workers, "Starting emd");

    let daemon = match lifecycle::startup(&config).await {
        Ok(d) => d,
        Err(e) => {
            // Write error synchronously (tracing is non-blocking and may not flush in time)
            if let Some(path) = &log_path {
                write_startup_error(path, &e);
            }
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    // Set up signal handlers
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                _ = sigint.recv() => info!("Received SIGINT, shutting down..."),
            }
            shutdown.cancel();
        }
    });

    info!("Daemon ready, listening on {}", daemon.local_addr()?);

    let result = daemon.run(shutdown).await;
    if let Err(e) = &result {
        error!("Daemon stopped with error: {}", e);
    } else {
        info!("Daemon stopped");
    }
    drop(log_guard);
    result?;
    Ok(())
}

/// Startup marker prefix written to log before anything else.
/// Full format: "--- emd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- emd: starting (pid: ";

/// Write startup marker to log file (appends to existing log)
fn write_startup_marker(log_path: &Path) -> Result<(), LifecycleError> {
    use std::io::Write;

    // Create log directory if needed
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;

    Ok(())
}

/// Write startup error synchronously to log file.
fn write_startup_error(log_path: &Path, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

fn setup_logging(
    log_path: Option<&Path>,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let (writer, guard) = match log_path {
        Some(path) => {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            let file_name = path.file_name().ok_or_else(|| {
                LifecycleError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("log path has no file name: {}", path.display()),
                ))
            })?;
            std::fs::create_dir_all(dir)?;
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name))
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    // Set up subscriber with env filter
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(log_path.is_none()))
        .init();

    Ok(guard)
}

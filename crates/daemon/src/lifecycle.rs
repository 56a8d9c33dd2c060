// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: configuration, startup, run, shutdown.

use std::fs::File;
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use em_adapters::{
    LocalBroker, QueueError, Subscriber, Subscription, TracedPublisher, TracedSubscriber,
};
use em_core::{resolve_max_workers, ConfigError, Settings, UuidIdGen};
use em_engine::{
    DispatchError, DispatchReport, Dispatcher, Handler, HandlerExt, PoolError, RetryPolicy,
    WorkerPool,
};
use em_webhook::{router, Translator, WebhookState};
use fs2::FileExt;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::handler::EventHandler;

/// Config file read when `--config` is not given; optional
pub const DEFAULT_CONFIG_PATH: &str = "emd.toml";

/// Lock file held inside the data directory
const LOCK_FILE: &str = "emd.lock";

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub max_workers: Option<i64>,
    pub listen: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub drain_timeout: Option<Duration>,
    pub log_path: Option<PathBuf>,
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    /// Resolved worker pool capacity
    pub max_workers: usize,
}

impl Config {
    /// Load the config file and apply command-line overrides.
    ///
    /// An explicitly named file must exist; the default one is optional.
    pub fn load(overrides: Overrides) -> Result<Self, LifecycleError> {
        let settings = match &overrides.config_path {
            Some(path) => Settings::load(path)?,
            None => Settings::load_or_default(Path::new(DEFAULT_CONFIG_PATH))?,
        };
        Ok(Self::resolve(settings, overrides))
    }

    pub fn resolve(mut settings: Settings, overrides: Overrides) -> Self {
        if let Some(listen) = overrides.listen {
            settings.webhook.listen = listen;
        }
        if let Some(dir) = overrides.data_dir {
            settings.queue.data_dir = Some(dir);
        }
        if let Some(timeout) = overrides.drain_timeout {
            settings.consumer.drain_timeout = timeout;
        }
        if let Some(path) = overrides.log_path {
            settings.log_path = Some(path);
        }
        let max_workers = resolve_max_workers(overrides.max_workers, settings.max_workers);
        Self {
            settings,
            max_workers,
        }
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to lock data directory {0}: daemon already running?")]
    LockFailed(PathBuf, #[source] std::io::Error),

    #[error("Failed to bind {0}: {1}")]
    BindFailed(String, #[source] std::io::Error),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Worker pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("HTTP server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("HTTP server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Daemon state between startup and shutdown
pub struct Daemon {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: Option<File>,
    broker: LocalBroker,
    listener: TcpListener,
}

/// Start the daemon: lock the data directory, open the broker, bind the listener
pub async fn startup(config: &Config) -> Result<Daemon, LifecycleError> {
    let settings = &config.settings;
    let prefix = settings.consumer.subscription_prefix.as_str();
    let redelivery_delay = settings.queue.redelivery_delay;

    let (lock_file, broker) = match &settings.queue.data_dir {
        Some(dir) => {
            let lock_file = lock_data_dir(dir)?;
            let broker = LocalBroker::open(dir, prefix, redelivery_delay)?;
            (Some(lock_file), broker)
        }
        None => {
            warn!("no data directory configured, queue is not durable");
            (None, LocalBroker::in_memory(prefix, redelivery_delay))
        }
    };

    // Bind LAST: only after the broker is usable
    let listen = settings.webhook.listen.as_str();
    let listener = TcpListener::bind(listen)
        .await
        .map_err(|e| LifecycleError::BindFailed(listen.to_string(), e))?;

    info!(
        listen = %listener.local_addr()?,
        max_workers = config.max_workers,
        topic = %settings.consumer.topic,
        "daemon started"
    );

    Ok(Daemon {
        config: config.clone(),
        lock_file,
        broker,
        listener,
    })
}

fn lock_data_dir(dir: &Path) -> Result<File, LifecycleError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(LOCK_FILE);
    let mut lock_file = File::create(&path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|e| LifecycleError::LockFailed(dir.to_path_buf(), e))?;
    writeln!(lock_file, "{}", std::process::id())?;
    Ok(lock_file)
}

impl Daemon {
    pub fn local_addr(&self) -> Result<SocketAddr, LifecycleError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn broker(&self) -> &LocalBroker {
        &self.broker
    }

    /// Serve webhooks and consume the queue until `shutdown` is cancelled.
    ///
    /// Shutdown stops the HTTP server, drains the dispatcher, then closes the
    /// broker.
    pub async fn run(self, shutdown: CancellationToken) -> Result<DispatchReport, LifecycleError> {
        let Daemon {
            config,
            lock_file,
            broker,
            listener,
        } = self;
        let settings = &config.settings;
        let publisher = TracedPublisher::new(broker.clone());

        // Subscribe before serving so nothing published lands in the backlog
        let subscription = TracedSubscriber::new(broker.clone())
            .subscribe(&settings.consumer.topic)
            .await?;

        let webhook = WebhookState::new(
            publisher.clone(),
            Translator::new(&settings.webhook.tenant, &settings.webhook.namespace),
            settings.webhook.topic.as_str(),
            UuidIdGen,
        );
        let app = router(webhook);
        let server = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move { shutdown.cancelled().await })
                    .await
            }
        });

        let pool = WorkerPool::new(config.max_workers)?;
        let handler = EventHandler::new(UuidIdGen, settings.consumer.processing_delay)
            .with_recoverer()
            .with_retry(RetryPolicy::from(&settings.retry))
            .with_correlation_id();
        let drain_timeout = settings.consumer.drain_timeout;
        let dispatched = match &settings.consumer.output_topic {
            Some(topic) => {
                let handler = handler.with_output(publisher, topic.as_str());
                consume(pool, handler, drain_timeout, subscription, shutdown.clone()).await
            }
            None => consume(pool, handler, drain_timeout, subscription, shutdown.clone()).await,
        };

        broker.close();
        shutdown.cancel();
        let served = server.await?;
        drop(lock_file);

        let report = dispatched.inspect_err(|e| error!("Dispatcher stopped: {}", e))?;
        served.map_err(LifecycleError::Serve)?;
        info!(
            received = report.received,
            acked = report.acked,
            nacked = report.nacked,
            panicked = report.panicked,
            rejected = report.rejected,
            "daemon shutdown complete"
        );
        Ok(report)
    }
}

async fn consume<H: Handler>(
    pool: WorkerPool,
    handler: H,
    drain_timeout: Duration,
    subscription: Subscription,
    shutdown: CancellationToken,
) -> Result<DispatchReport, DispatchError> {
    Dispatcher::new(pool, handler)
        .with_drain_timeout(drain_timeout)
        .run(subscription, shutdown)
        .await
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;

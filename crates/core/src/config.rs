// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Settings loaded from the daemon's TOML configuration file
//!
//! Every key is optional. Command-line flags are applied on top by the
//! binaries; this module only knows about the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Worker count used when neither the command line nor the file sets one
pub const DEFAULT_MAX_WORKERS: usize = 50;

/// Errors loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("invalid config {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
}

/// Top-level settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Maximum concurrently running processing tasks
    pub max_workers: Option<i64>,
    /// Log file; stderr when unset
    pub log_path: Option<PathBuf>,
    pub webhook: WebhookSettings,
    pub consumer: ConsumerSettings,
    pub retry: RetrySettings,
    pub queue: QueueSettings,
}

/// HTTP ingestion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebhookSettings {
    pub listen: String,
    /// Topic events are published to
    pub topic: String,
    pub tenant: String,
    pub namespace: String,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_string(),
            topic: "incoming.event.topic".to_string(),
            tenant: "customer1".to_string(),
            namespace: "default".to_string(),
        }
    }
}

/// Queue consumer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsumerSettings {
    pub topic: String,
    pub subscription_prefix: String,
    /// Upper bound on waiting for in-flight tasks during shutdown
    #[serde(with = "humantime_serde")]
    pub drain_timeout: Duration,
    /// Where messages produced by handlers are forwarded
    pub output_topic: Option<String>,
    /// Simulated work per message
    #[serde(with = "humantime_serde")]
    pub processing_delay: Duration,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            topic: "incoming.event.topic".to_string(),
            subscription_prefix: "maira-sub".to_string(),
            drain_timeout: Duration::from_secs(30),
            output_topic: None,
            processing_delay: Duration::ZERO,
        }
    }
}

/// Retry-with-backoff settings for failing handlers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub max_retries: u32,
    #[serde(with = "humantime_serde")]
    pub initial_interval: Duration,
    pub multiplier: f64,
    #[serde(with = "humantime_serde")]
    pub max_interval: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_interval: Duration::from_millis(100),
            multiplier: 2.0,
            max_interval: Duration::from_secs(10),
        }
    }
}

/// Broker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueSettings {
    /// Journal directory; the broker is in-memory only when unset
    pub data_dir: Option<PathBuf>,
    #[serde(with = "humantime_serde")]
    pub redelivery_delay: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            redelivery_delay: Duration::from_secs(1),
        }
    }
}

impl Settings {
    /// Parse settings from TOML text
    pub fn from_toml(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(origin.to_path_buf(), e))
    }

    /// Load settings from a file that must exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        Self::from_toml(&content, path)
    }

    /// Load settings from a file, falling back to defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Read(path.to_path_buf(), e)),
        }
    }
}

/// Resolve the worker pool capacity.
///
/// Precedence: explicit argument, then configuration value, then
/// [`DEFAULT_MAX_WORKERS`]. Values `<= 0` count as unset.
pub fn resolve_max_workers(argument: Option<i64>, configured: Option<i64>) -> usize {
    [argument, configured]
        .into_iter()
        .flatten()
        .find(|n| *n > 0)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(DEFAULT_MAX_WORKERS)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for a running emd webhook endpoint

use std::time::Duration;

use thiserror::Error;

/// Webhook URL used when neither `--url` nor `EM_WEBHOOK_URL` is set
pub const DEFAULT_URL: &str = "http://127.0.0.1:8080/webhook";

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for one webhook request
pub fn timeout_request() -> Duration {
    parse_duration_ms("EM_TIMEOUT_MS").unwrap_or(Duration::from_secs(10))
}

/// Target URL: explicit flag, then `EM_WEBHOOK_URL`, then [`DEFAULT_URL`]
pub fn resolve_url(explicit: Option<String>) -> String {
    explicit
        .or_else(|| std::env::var("EM_WEBHOOK_URL").ok())
        .unwrap_or_else(|| DEFAULT_URL.to_string())
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Could not reach {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: ureq::Error,
    },

    #[error("Payload rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Failed to read response: {0}")]
    Read(#[source] ureq::Error),
}

/// Posts payloads to the daemon's webhook endpoint
pub struct WebhookClient {
    url: String,
    agent: ureq::Agent,
}

impl WebhookClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        // Error statuses carry the daemon's explanation in the body
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            url: url.into(),
            agent,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST a JSON payload; returns the response body on a 2xx status
    pub fn send(&self, payload: &[u8]) -> Result<String, ClientError> {
        let mut response = self
            .agent
            .post(&self.url)
            .header("content-type", "application/json")
            .send(payload)
            .map_err(|source| ClientError::Unreachable {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(ClientError::Read)?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(ClientError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

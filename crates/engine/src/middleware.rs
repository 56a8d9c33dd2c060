// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handler middleware
//!
//! Each wrapper is itself a [`Handler`]. The daemon stacks them as
//! `handler.with_recoverer().with_retry(..).with_correlation_id()`, so a
//! panic becomes a transient error that Retry can see, and produced messages
//! carry the incoming correlation id.

use crate::error::HandlerError;
use crate::handler::Handler;
use async_trait::async_trait;
use em_adapters::Publisher;
use em_core::{QueuedMessage, RetrySettings};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

/// Builder methods for stacking middleware
pub trait HandlerExt: Handler + Sized {
    fn with_recoverer(self) -> Recoverer<Self> {
        Recoverer { inner: self }
    }

    fn with_retry(self, policy: RetryPolicy) -> Retry<Self> {
        Retry {
            inner: self,
            policy,
        }
    }

    fn with_correlation_id(self) -> CorrelationId<Self> {
        CorrelationId { inner: self }
    }

    fn with_output<P: Publisher>(self, publisher: P, topic: impl Into<String>) -> Forward<Self, P> {
        Forward {
            inner: self,
            publisher,
            topic: topic.into(),
        }
    }
}

impl<H: Handler> HandlerExt for H {}

/// Converts a panic inside the wrapped handler into [`HandlerError::Panicked`]
pub struct Recoverer<H> {
    inner: H,
}

#[async_trait]
impl<H: Handler> Handler for Recoverer<H> {
    async fn handle(&self, message: &QueuedMessage) -> Result<Vec<QueuedMessage>, HandlerError> {
        match AssertUnwindSafe(self.inner.handle(message))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                tracing::error!(message_id = %message.id, panic = %reason, "handler panicked");
                Err(HandlerError::Panicked(reason))
            }
        }
    }
}

/// Text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Exponential backoff schedule
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (starting at 1)
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let delay = self.initial_interval.as_secs_f64() * factor;
        if !delay.is_finite() || delay >= self.max_interval.as_secs_f64() {
            self.max_interval
        } else {
            Duration::from_secs_f64(delay)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_interval: settings.initial_interval,
            multiplier: settings.multiplier,
            max_interval: settings.max_interval,
        }
    }
}

/// Retries transient failures with exponential backoff
pub struct Retry<H> {
    inner: H,
    policy: RetryPolicy,
}

#[async_trait]
impl<H: Handler> Handler for Retry<H> {
    async fn handle(&self, message: &QueuedMessage) -> Result<Vec<QueuedMessage>, HandlerError> {
        let mut retry = 0;
        loop {
            let err = match self.inner.handle(message).await {
                Ok(produced) => return Ok(produced),
                Err(err) => err,
            };
            // A settled message has already been decided by the handler
            if !err.is_transient() || message.is_settled() || retry >= self.policy.max_retries {
                return Err(err);
            }

            retry += 1;
            let delay = self.policy.backoff(retry);
            tracing::warn!(
                message_id = %message.id,
                retry,
                max_retries = self.policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying handler"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Copies the incoming correlation id onto every produced message
pub struct CorrelationId<H> {
    inner: H,
}

#[async_trait]
impl<H: Handler> Handler for CorrelationId<H> {
    async fn handle(&self, message: &QueuedMessage) -> Result<Vec<QueuedMessage>, HandlerError> {
        let mut produced = self.inner.handle(message).await?;
        if let Some(id) = message.correlation_id() {
            for out in &mut produced {
                out.set_correlation_id(id);
            }
        }
        Ok(produced)
    }
}

/// Publishes produced messages to an output topic
pub struct Forward<H, P> {
    inner: H,
    publisher: P,
    topic: String,
}

#[async_trait]
impl<H: Handler, P: Publisher> Handler for Forward<H, P> {
    async fn handle(&self, message: &QueuedMessage) -> Result<Vec<QueuedMessage>, HandlerError> {
        let produced = self.inner.handle(message).await?;
        if produced.is_empty() {
            return Ok(produced);
        }

        let count = produced.len();
        self.publisher
            .publish(&self.topic, produced)
            .await
            .map_err(|e| {
                tracing::warn!(message_id = %message.id, topic = %self.topic, error = %e, "forward failed");
                HandlerError::transient(format!("forward to {}: {}", self.topic, e))
            })?;
        tracing::debug!(message_id = %message.id, topic = %self.topic, count, "forwarded");
        Ok(Vec::new())
    }
}

#[cfg(test)]
#[path = "middleware_tests.rs"]
mod tests;

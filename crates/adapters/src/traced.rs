// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced queue wrappers for consistent observability

use crate::queue::{Publisher, QueueError, Subscriber, Subscription};
use async_trait::async_trait;
use em_core::QueuedMessage;
use tracing::Instrument;

/// Wrapper that adds tracing to any Publisher
#[derive(Clone)]
pub struct TracedPublisher<P> {
    inner: P,
}

impl<P> TracedPublisher<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P: Publisher> Publisher for TracedPublisher<P> {
    async fn publish(&self, topic: &str, messages: Vec<QueuedMessage>) -> Result<(), QueueError> {
        let span = tracing::info_span!("queue.publish", topic, count = messages.len());

        async move {
            // Empty batches never reach the broker
            if messages.is_empty() {
                tracing::debug!("nothing to publish");
                return Ok(());
            }

            tracing::debug!(
                ids = ?messages.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
                "publishing"
            );

            let start = std::time::Instant::now();
            let result = self.inner.publish(topic, messages).await;
            let elapsed = start.elapsed();

            match &result {
                Ok(()) => tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "published"),
                Err(e) => tracing::error!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "publish failed"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }
}

/// Wrapper that adds tracing to any Subscriber
#[derive(Clone)]
pub struct TracedSubscriber<S> {
    inner: S,
}

impl<S> TracedSubscriber<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: Subscriber> Subscriber for TracedSubscriber<S> {
    async fn subscribe(&self, topic: &str) -> Result<Subscription, QueueError> {
        let span = tracing::info_span!("queue.subscribe", topic);

        let result = self.inner.subscribe(topic).instrument(span.clone()).await;
        span.in_scope(|| match &result {
            Ok(sub) => tracing::info!(subscription = sub.name(), "subscription open"),
            Err(e) => tracing::error!(error = %e, "subscribe failed"),
        });

        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;

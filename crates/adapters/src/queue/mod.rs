// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message queue adapters

mod local;

pub use local::LocalBroker;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakePublisher, PublishCall};

use async_trait::async_trait;
use em_core::QueuedMessage;
use em_storage::WalError;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,
    #[error("subscription already active: {0}")]
    AlreadySubscribed(String),
    #[error("journal error: {0}")]
    Journal(#[from] WalError),
    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// Publishes messages to a named topic
#[async_trait]
pub trait Publisher: Clone + Send + Sync + 'static {
    /// Publish a batch of messages. Returns once the broker has accepted all
    /// of them.
    async fn publish(&self, topic: &str, messages: Vec<QueuedMessage>) -> Result<(), QueueError>;
}

/// Opens subscriptions on a named topic
#[async_trait]
pub trait Subscriber: Clone + Send + Sync + 'static {
    async fn subscribe(&self, topic: &str) -> Result<Subscription, QueueError>;
}

/// Subscription name for a topic: `<prefix>_<topic>`
pub fn subscription_name(prefix: &str, topic: &str) -> String {
    format!("{}_{}", prefix, topic)
}

/// Stream of deliveries for one subscription.
///
/// Ends when the broker closes the subscription.
#[derive(Debug)]
pub struct Subscription {
    name: String,
    rx: mpsc::UnboundedReceiver<QueuedMessage>,
}

impl Subscription {
    pub fn new(name: impl Into<String>, rx: mpsc::UnboundedReceiver<QueuedMessage>) -> Self {
        Self {
            name: name.into(),
            rx,
        }
    }

    /// Create a subscription fed by the returned sender
    pub fn channel(name: impl Into<String>) -> (mpsc::UnboundedSender<QueuedMessage>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(name, rx))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Next delivery, or `None` once the stream has ended
    pub async fn next(&mut self) -> Option<QueuedMessage> {
        self.rx.recv().await
    }
}

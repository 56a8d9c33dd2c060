// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake publisher for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{Publisher, QueueError};
use async_trait::async_trait;
use em_core::QueuedMessage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Recorded publish
#[derive(Debug, Clone)]
pub struct PublishCall {
    pub topic: String,
    pub messages: Vec<QueuedMessage>,
}

/// Fake publisher that records batches and can be told to fail
#[derive(Clone, Default)]
pub struct FakePublisher {
    calls: Arc<Mutex<Vec<PublishCall>>>,
    failing: Arc<AtomicBool>,
}

impl FakePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every subsequent publish
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Get all recorded publishes
    pub fn calls(&self) -> Vec<PublishCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// All published messages for a topic, in order
    pub fn published(&self, topic: &str) -> Vec<QueuedMessage> {
        self.calls()
            .into_iter()
            .filter(|call| call.topic == topic)
            .flat_map(|call| call.messages)
            .collect()
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn publish(&self, topic: &str, messages: Vec<QueuedMessage>) -> Result<(), QueueError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(QueueError::Rejected(format!("fake failure on {}", topic)));
        }
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(PublishCall {
                topic: topic.to_string(),
                messages,
            });
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queued messages and their acknowledgment discipline
//!
//! A `QueuedMessage` is an opaque payload plus metadata. Each delivery carries
//! a settlement slot that accepts exactly one terminal disposition: the first
//! `ack()` or `nack()` wins and is forwarded to the broker, later calls are
//! no-ops.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Metadata key holding the correlation identifier
pub const CORRELATION_ID_KEY: &str = "correlation_id";

/// String metadata attached to a message
pub type Metadata = BTreeMap<String, String>;

/// Terminal outcome of one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    /// Processed; remove from the queue
    Ack,
    /// Not processed; eligible for redelivery
    Nack,
}

/// Receives the disposition of a delivery (implemented by brokers)
pub trait Settle: Send + Sync {
    fn settle(&self, message: &QueuedMessage, disposition: Disposition);
}

struct AckState {
    outcome: OnceLock<Disposition>,
    sink: Option<Arc<dyn Settle>>,
}

impl AckState {
    fn detached() -> Arc<Self> {
        Arc::new(Self {
            outcome: OnceLock::new(),
            sink: None,
        })
    }
}

/// The unit the dispatcher consumes.
///
/// Clones share the same settlement slot, so a clone handed to a handler
/// and the original held by the dispatcher agree on whether the delivery
/// has been settled.
#[derive(Clone)]
pub struct QueuedMessage {
    /// Unique per message instance, generated at publish time
    pub id: String,
    pub payload: Vec<u8>,
    pub metadata: Metadata,
    /// Delivery attempt, starting at 1
    pub attempt: u32,
    ack: Arc<AckState>,
}

impl QueuedMessage {
    pub fn new(id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
            metadata: Metadata::new(),
            attempt: 1,
            ack: AckState::detached(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.metadata.get(CORRELATION_ID_KEY).map(String::as_str)
    }

    pub fn set_correlation_id(&mut self, id: impl Into<String>) {
        self.metadata.insert(CORRELATION_ID_KEY.to_string(), id.into());
    }

    /// Attach a fresh settlement slot that reports to `sink`
    pub fn bind(mut self, sink: Arc<dyn Settle>) -> Self {
        self.ack = Arc::new(AckState {
            outcome: OnceLock::new(),
            sink: Some(sink),
        });
        self
    }

    /// Copy for the next delivery attempt (unsettled, unbound)
    pub fn redelivery(&self) -> Self {
        Self {
            id: self.id.clone(),
            payload: self.payload.clone(),
            metadata: self.metadata.clone(),
            attempt: self.attempt.saturating_add(1),
            ack: AckState::detached(),
        }
    }

    /// Acknowledge the delivery. Returns false if it was already settled.
    pub fn ack(&self) -> bool {
        self.settle(Disposition::Ack)
    }

    /// Negatively acknowledge the delivery. Returns false if it was already settled.
    pub fn nack(&self) -> bool {
        self.settle(Disposition::Nack)
    }

    pub fn disposition(&self) -> Option<Disposition> {
        self.ack.outcome.get().copied()
    }

    pub fn is_settled(&self) -> bool {
        self.ack.outcome.get().is_some()
    }

    fn settle(&self, disposition: Disposition) -> bool {
        match self.ack.outcome.set(disposition) {
            Ok(()) => {
                if let Some(sink) = &self.ack.sink {
                    sink.settle(self, disposition);
                }
                true
            }
            Err(_) => {
                if self.disposition() != Some(disposition) {
                    tracing::warn!(
                        message_id = %self.id,
                        requested = ?disposition,
                        settled = ?self.disposition(),
                        "ignoring conflicting settlement"
                    );
                }
                false
            }
        }
    }
}

impl fmt::Debug for QueuedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedMessage")
            .field("id", &self.id)
            .field("payload_len", &self.payload.len())
            .field("metadata", &self.metadata)
            .field("attempt", &self.attempt)
            .field("disposition", &self.disposition())
            .finish()
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;

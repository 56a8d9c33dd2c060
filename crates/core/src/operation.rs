// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operations recorded in the broker journal

use crate::message::Metadata;
use serde::{Deserialize, Serialize};

/// Operations that can be persisted to the journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueOp {
    /// A subscription was created for a topic
    Subscribed { topic: String, subscription: String },

    /// A message was accepted for a topic
    Published {
        topic: String,
        id: String,
        payload: Vec<u8>,
        #[serde(default)]
        metadata: Metadata,
    },

    /// A subscription acknowledged a message
    Acked { subscription: String, id: String },
}

impl QueueOp {
    /// Short name used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            QueueOp::Subscribed { .. } => "subscribed",
            QueueOp::Published { .. } => "published",
            QueueOp::Acked { .. } => "acked",
        }
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;

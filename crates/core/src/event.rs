// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured event record carried through the queue

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from building or decoding an event record
#[derive(Debug, Error)]
pub enum EventError {
    #[error("event record is missing required field: {0}")]
    MissingField(&'static str),
    #[error("event payload could not be encoded or decoded: {0}")]
    Json(#[from] serde_json::Error),
}

/// One alert, as it travels through the queue.
///
/// Constructed once per inbound alert and never mutated afterwards; the
/// consumer side only ever sees it as opaque bytes until a handler decodes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub tenant: String,
    pub namespace: String,
    pub event_type: String,
    /// Host component of the alert source's external URL
    pub site: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl EventRecord {
    /// Check the invariant for records entering the queue
    pub fn validate(&self) -> Result<(), EventError> {
        if self.tenant.is_empty() {
            return Err(EventError::MissingField("tenant"));
        }
        if self.namespace.is_empty() {
            return Err(EventError::MissingField("namespace"));
        }
        if self.event_type.is_empty() {
            return Err(EventError::MissingField("event_type"));
        }
        Ok(())
    }

    /// Serialize to the byte payload published on the queue
    pub fn to_payload(&self) -> Result<Vec<u8>, EventError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a queue payload back into a record
    pub fn from_payload(payload: &[u8]) -> Result<Self, EventError> {
        let record: EventRecord = serde_json::from_slice(payload)?;
        record.validate()?;
        Ok(record)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;

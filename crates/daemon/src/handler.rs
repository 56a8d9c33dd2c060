// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Default processing task for queued events

use std::time::Duration;

use async_trait::async_trait;
use em_core::{EventRecord, IdGen, QueuedMessage};
use em_engine::{Handler, HandlerError};
use tracing::info;

/// Decodes each message as an [`EventRecord`], simulates the configured
/// amount of work, and produces a copy of the event under a new id.
///
/// An undecodable payload will never succeed on redelivery, so it is a
/// permanent failure.
pub struct EventHandler<G> {
    ids: G,
    processing_delay: Duration,
}

impl<G: IdGen> EventHandler<G> {
    pub fn new(ids: G, processing_delay: Duration) -> Self {
        Self {
            ids,
            processing_delay,
        }
    }
}

#[async_trait]
impl<G: IdGen> Handler for EventHandler<G> {
    async fn handle(&self, message: &QueuedMessage) -> Result<Vec<QueuedMessage>, HandlerError> {
        let record = EventRecord::from_payload(&message.payload)
            .map_err(|e| HandlerError::permanent(format!("undecodable event: {}", e)))?;

        if !self.processing_delay.is_zero() {
            tokio::time::sleep(self.processing_delay).await;
        }

        info!(
            message_id = %message.id,
            tenant = %record.tenant,
            namespace = %record.namespace,
            event_type = %record.event_type,
            site = %record.site,
            severity = %record.severity,
            "event processed"
        );

        Ok(vec![QueuedMessage::new(
            self.ids.next(),
            message.payload.clone(),
        )])
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP endpoints
//!
//! - `POST /webhook` (and `POST /`): translate an Alertmanager payload and
//!   publish one message per alert
//! - `GET /health`: liveness probe

use crate::translate::{TranslateError, Translator};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use em_adapters::{Publisher, QueueError};
use em_core::{EventError, IdGen, QueuedMessage};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Response body for an accepted payload
pub const SUCCESS_BODY: &str = "successfully processed";

/// Errors answering a webhook call
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error(transparent)]
    Translate(#[from] TranslateError),
    #[error("encoding event: {0}")]
    Encode(#[from] EventError),
    #[error("publishing events: {0}")]
    Publish(#[from] QueueError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::Translate(_) => StatusCode::BAD_REQUEST,
            WebhookError::Encode(_) | WebhookError::Publish(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

/// Shared state for the webhook routes
#[derive(Clone)]
pub struct WebhookState<P, G> {
    publisher: P,
    translator: Arc<Translator>,
    topic: Arc<str>,
    ids: G,
}

impl<P: Publisher, G: IdGen> WebhookState<P, G> {
    pub fn new(publisher: P, translator: Translator, topic: impl Into<Arc<str>>, ids: G) -> Self {
        Self {
            publisher,
            translator: Arc::new(translator),
            topic: topic.into(),
            ids,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Build the router serving the webhook and health endpoints
pub fn router<P: Publisher, G: IdGen>(state: WebhookState<P, G>) -> Router {
    Router::new()
        .route("/", post(receive::<P, G>))
        .route("/webhook", post(receive::<P, G>))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn receive<P: Publisher, G: IdGen>(
    State(state): State<WebhookState<P, G>>,
    body: Bytes,
) -> Result<&'static str, WebhookError> {
    let records = state.translator.translate(&body).map_err(|e| {
        warn!(error = %e, "rejecting webhook payload");
        e
    })?;
    debug!(count = records.len(), "translated webhook payload");
    if records.is_empty() {
        return Ok(SUCCESS_BODY);
    }

    let mut messages = Vec::with_capacity(records.len());
    for record in &records {
        let mut message = QueuedMessage::new(state.ids.next(), record.to_payload()?);
        message.set_correlation_id(state.ids.next());
        info!(
            message_id = %message.id,
            correlation_id = message.correlation_id().unwrap_or_default(),
            event_type = %record.event_type,
            site = %record.site,
            "sending message"
        );
        messages.push(message);
    }

    state
        .publisher
        .publish(&state.topic, messages)
        .await
        .map_err(|e| {
            warn!(topic = %state.topic, error = %e, "failed to publish events");
            e
        })?;
    Ok(SUCCESS_BODY)
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Translation from Alertmanager payloads to event records

use crate::alert::{Alert, AlertPayload};
use chrono::{DateTime, Utc};
use em_core::{EventError, EventRecord};
use thiserror::Error;
use url::Url;

/// Label naming the alert; becomes the event type
const ALERTNAME_LABEL: &str = "alertname";
const SEVERITY_LABEL: &str = "severity";
const DESCRIPTION_ANNOTATION: &str = "description";

/// Errors translating a webhook payload. Any error rejects the whole payload.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("{0}")]
    Parse(#[from] serde_json::Error),
    #[error("external URL has no host: {0:?}")]
    UnparsableHost(String),
    #[error("alert {index} is not a valid event: {source}")]
    InvalidEvent {
        index: usize,
        #[source]
        source: EventError,
    },
}

/// Builds one [`EventRecord`] per alert, stamped with a fixed tenant and namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translator {
    tenant: String,
    namespace: String,
}

impl Translator {
    pub fn new(tenant: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            namespace: namespace.into(),
        }
    }

    /// Translate a raw JSON payload
    pub fn translate(&self, raw: &[u8]) -> Result<Vec<EventRecord>, TranslateError> {
        self.translate_at(raw, Utc::now())
    }

    /// Translate a raw JSON payload; alerts without a start time get `received_at`
    pub fn translate_at(
        &self,
        raw: &[u8],
        received_at: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, TranslateError> {
        let payload = AlertPayload::from_slice(raw)?;
        self.records(&payload, received_at)
    }

    /// Translate an already decoded payload
    pub fn records(
        &self,
        payload: &AlertPayload,
        received_at: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, TranslateError> {
        if payload.alerts.is_empty() {
            return Ok(Vec::new());
        }
        let site = site(&payload.external_url)?;

        payload
            .alerts
            .iter()
            .enumerate()
            .map(|(index, alert)| {
                let record = self.record(alert, &site, received_at);
                record
                    .validate()
                    .map_err(|source| TranslateError::InvalidEvent { index, source })?;
                Ok(record)
            })
            .collect()
    }

    fn record(&self, alert: &Alert, site: &str, received_at: DateTime<Utc>) -> EventRecord {
        let label = |key: &str| alert.labels.get(key).cloned().unwrap_or_default();
        EventRecord {
            tenant: self.tenant.clone(),
            namespace: self.namespace.clone(),
            event_type: label(ALERTNAME_LABEL),
            site: site.to_string(),
            timestamp: alert.starts_at.unwrap_or(received_at),
            message: alert
                .annotations
                .get(DESCRIPTION_ANNOTATION)
                .cloned()
                .unwrap_or_default(),
            severity: label(SEVERITY_LABEL),
            labels: alert.labels.clone(),
            annotations: alert.annotations.clone(),
        }
    }
}

/// Host component of a URL, without port
fn site(external_url: &str) -> Result<String, TranslateError> {
    Url::parse(external_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .filter(|host| !host.is_empty())
        .ok_or_else(|| TranslateError::UnparsableHost(external_url.to_string()))
}

#[cfg(test)]
#[path = "translate_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-friendly error display with context and suggestions.

use std::fmt;
use std::path::Path;

use crate::client::ClientError;

/// Error with context and recovery suggestions for user-friendly display.
#[derive(Debug)]
pub struct EmError {
    /// What went wrong
    pub message: String,
    /// Why it might have happened
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
    /// Original error if any
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl EmError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
            source: None,
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for EmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for EmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Common error builders for typical failure scenarios.
impl EmError {
    /// Payload file could not be read
    pub fn unreadable_payload(path: &Path, source: std::io::Error) -> Self {
        EmError::new(format!("Cannot read payload '{}'", path.display()))
            .with_context(source.to_string())
            .with_suggestion("Pass a file containing an Alertmanager webhook body, or - for stdin")
            .with_source(source)
    }

    /// Payload was not a valid Alertmanager webhook body
    pub fn invalid_payload(source: em_webhook::TranslateError) -> Self {
        EmError::new("Payload could not be translated")
            .with_context(source.to_string())
            .with_suggestion("Check that the body is JSON with an \"alerts\" array")
            .with_suggestion("Every alert needs an alertname label and externalURL a host")
            .with_source(source)
    }

    /// Sending to the daemon failed
    pub fn send_failed(url: &str, source: ClientError) -> Self {
        let err = match &source {
            ClientError::Unreachable { .. } => {
                EmError::new(format!("Daemon not reachable at {}", url))
                    .with_context(source.to_string())
                    .with_suggestion("Start the daemon: emd")
                    .with_suggestion("Point at another daemon: em send --url <URL> <FILE>")
            }
            ClientError::Rejected { status, body } => {
                EmError::new(format!("Daemon rejected the payload ({})", status))
                    .with_context(body.trim().to_string())
                    .with_suggestion("Check the payload offline first: em translate <FILE>")
            }
            ClientError::Read(_) => {
                EmError::new(format!("Incomplete response from {}", url))
                    .with_context(source.to_string())
            }
        };
        err.with_source(source)
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the consume loop

use crate::dispatcher::DispatchReport;
use std::fmt::Display;
use thiserror::Error;

/// Errors from the worker slot pool
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool is closed")]
    Closed,
    #[error("worker pool invariant violated: {0}")]
    InvariantViolation(String),
}

/// Failure reported by a processing task
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// May succeed on a later attempt; the message is nacked
    #[error("transient failure: {0}")]
    Transient(String),
    /// Retrying will not help; the message is acked and the failure logged
    #[error("permanent failure: {0}")]
    Permanent(String),
    /// The handler panicked; treated as transient
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn transient(reason: impl Display) -> Self {
        Self::Transient(reason.to_string())
    }

    pub fn permanent(reason: impl Display) -> Self {
        Self::Permanent(reason.to_string())
    }

    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Permanent(_))
    }
}

/// Errors that end a dispatch run abnormally
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("drain timed out with {outstanding} task(s) still running")]
    DrainTimeout {
        outstanding: usize,
        report: DispatchReport,
    },
    #[error(transparent)]
    Pool(#[from] PoolError),
}

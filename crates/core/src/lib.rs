// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! em-core: shared types for the event manager
//!
//! This crate provides:
//! - The `EventRecord` carried through the queue
//! - `QueuedMessage` with its acknowledgment discipline
//! - Journal operations for the durable broker
//! - Settings loaded from TOML

pub mod config;
pub mod event;
pub mod id;
pub mod message;
pub mod operation;

pub use config::{
    resolve_max_workers, ConfigError, ConsumerSettings, QueueSettings, RetrySettings, Settings,
    WebhookSettings, DEFAULT_MAX_WORKERS,
};
pub use event::{EventError, EventRecord};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use message::{Disposition, Metadata, QueuedMessage, Settle, CORRELATION_ID_KEY};
pub use operation::QueueOp;

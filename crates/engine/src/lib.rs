// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Bounded-concurrency consume-and-acknowledge engine

mod dispatcher;
mod error;
mod handler;
mod middleware;
mod pool;

pub use dispatcher::{DispatchReport, Dispatcher, DEFAULT_DRAIN_TIMEOUT};
pub use error::{DispatchError, HandlerError, PoolError};
pub use handler::{handler_fn, Handler, HandlerFn};
pub use middleware::{CorrelationId, Forward, HandlerExt, Recoverer, Retry, RetryPolicy};
pub use pool::{WorkerPool, WorkerSlot};

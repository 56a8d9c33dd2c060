// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Processing task contract
//!
//! A handler does the work for one message and reports the outcome. The
//! dispatcher turns that outcome into the message's single disposition:
//!
//! | outcome                      | disposition |
//! |------------------------------|-------------|
//! | `Ok(produced)`               | ack         |
//! | `Err(Permanent)`             | ack, logged |
//! | `Err(Transient \| Panicked)` | nack        |
//!
//! A handler may settle the message itself; the dispatcher then leaves it alone.

use crate::error::HandlerError;
use async_trait::async_trait;
use em_core::QueuedMessage;
use std::future::Future;
use std::sync::Arc;

/// Work performed for one queued message
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Process the message, returning any messages it produced
    async fn handle(&self, message: &QueuedMessage) -> Result<Vec<QueuedMessage>, HandlerError>;
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    async fn handle(&self, message: &QueuedMessage) -> Result<Vec<QueuedMessage>, HandlerError> {
        (**self).handle(message).await
    }
}

/// Handler backed by an async closure
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

/// Build a handler from an async closure taking the message by value.
///
/// The closure receives a clone that shares the original's settlement state.
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(QueuedMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<QueuedMessage>, HandlerError>> + Send + 'static,
{
    HandlerFn { f }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(QueuedMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<QueuedMessage>, HandlerError>> + Send + 'static,
{
    async fn handle(&self, message: &QueuedMessage) -> Result<Vec<QueuedMessage>, HandlerError> {
        (self.f)(message.clone()).await
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded-concurrency consume loop
//!
//! The dispatcher pulls messages from a subscription one at a time, takes a
//! worker slot for each (blocking when all slots are busy, which stops it
//! from pulling further messages), and spawns a processing task that owns the
//! slot until it finishes. When the subscription ends or shutdown is signalled
//! it stops admitting work and waits, up to the drain timeout, for every
//! started task to give its slot back.

use crate::error::{DispatchError, HandlerError};
use crate::handler::Handler;
use crate::middleware::panic_message;
use crate::pool::{WorkerPool, WorkerSlot};
use em_adapters::Subscription;
use em_core::{Disposition, QueuedMessage};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Default upper bound on waiting for in-flight tasks at shutdown
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Counters describing one dispatch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Messages pulled from the subscription
    pub received: usize,
    /// Processing tasks spawned
    pub started: usize,
    pub acked: usize,
    pub nacked: usize,
    /// Tasks whose handler panicked (also counted as nacked)
    pub panicked: usize,
    /// Messages nacked because shutdown arrived before a slot was free
    /// (also counted as nacked)
    pub rejected: usize,
}

#[derive(Default)]
struct Outcomes {
    acked: AtomicUsize,
    nacked: AtomicUsize,
    panicked: AtomicUsize,
}

impl Outcomes {
    fn record(&self, disposition: Option<Disposition>) {
        match disposition {
            Some(Disposition::Ack) => self.acked.fetch_add(1, Ordering::Relaxed),
            Some(Disposition::Nack) => self.nacked.fetch_add(1, Ordering::Relaxed),
            None => 0,
        };
    }
}

/// Bridges a subscription to a bounded set of processing tasks
pub struct Dispatcher<H> {
    pool: WorkerPool,
    handler: Arc<H>,
    drain_timeout: Duration,
}

impl<H: Handler> Dispatcher<H> {
    pub fn new(pool: WorkerPool, handler: H) -> Self {
        Self {
            pool,
            handler: Arc::new(handler),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Consume `subscription` until it ends or `shutdown` is cancelled, then drain.
    ///
    /// Returns once every started task has finished, or with
    /// [`DispatchError::DrainTimeout`] if some are still running when the
    /// drain timeout expires. Those tasks are left to finish on their own.
    pub async fn run(
        &self,
        mut subscription: Subscription,
        shutdown: CancellationToken,
    ) -> Result<DispatchReport, DispatchError> {
        let outcomes = Arc::new(Outcomes::default());
        let mut report = DispatchReport::default();
        let mut tasks = JoinSet::new();

        tracing::info!(
            subscription = subscription.name(),
            capacity = self.pool.capacity(),
            "dispatcher running"
        );

        loop {
            let message = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("shutdown requested, draining");
                    break;
                }
                next = subscription.next() => match next {
                    Some(message) => message,
                    None => {
                        tracing::info!("subscription ended, draining");
                        break;
                    }
                },
            };
            report.received += 1;

            let slot = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::warn!(
                        message_id = %message.id,
                        "shutdown before a worker slot was free, nacking"
                    );
                    message.nack();
                    report.rejected += 1;
                    break;
                }
                slot = self.pool.acquire() => match slot {
                    Ok(slot) => slot,
                    Err(e) => {
                        tracing::error!(message_id = %message.id, error = %e, "no worker slot, nacking");
                        message.nack();
                        report.rejected += 1;
                        break;
                    }
                },
            };

            report.started += 1;
            let span = tracing::info_span!(
                "process",
                message_id = %message.id,
                attempt = message.attempt,
                correlation_id = message.correlation_id().unwrap_or_default(),
            );
            tasks.spawn(
                process(Arc::clone(&self.handler), message, slot, Arc::clone(&outcomes))
                    .instrument(span),
            );

            while let Some(result) = tasks.try_join_next() {
                reap(result, &outcomes);
            }
        }

        let in_flight = self.pool.outstanding();
        tracing::info!(in_flight, timeout_ms = self.drain_timeout.as_millis() as u64, "draining");

        let drained = tokio::time::timeout(self.drain_timeout, async {
            while let Some(result) = tasks.join_next().await {
                reap(result, &outcomes);
            }
            self.pool.wait_idle().await;
        })
        .await;

        report.acked = outcomes.acked.load(Ordering::Relaxed);
        report.nacked = outcomes.nacked.load(Ordering::Relaxed) + report.rejected;
        report.panicked = outcomes.panicked.load(Ordering::Relaxed);

        if drained.is_err() {
            let outstanding = self.pool.outstanding();
            tracing::error!(outstanding, "drain timed out, leaving tasks running");
            tasks.detach_all();
            return Err(DispatchError::DrainTimeout {
                outstanding,
                report,
            });
        }

        tracing::info!(
            received = report.received,
            acked = report.acked,
            nacked = report.nacked,
            panicked = report.panicked,
            "dispatcher stopped"
        );
        Ok(report)
    }
}

/// One processing task. The slot is held for the task's whole life and
/// released when it is dropped here, on every exit path.
async fn process<H: Handler>(
    handler: Arc<H>,
    message: QueuedMessage,
    slot: WorkerSlot,
    outcomes: Arc<Outcomes>,
) {
    let _slot = slot;

    let result = match AssertUnwindSafe(handler.handle(&message))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            tracing::error!(panic = %reason, "handler panicked");
            Err(HandlerError::Panicked(reason))
        }
    };
    if matches!(result, Err(HandlerError::Panicked(_))) {
        outcomes.panicked.fetch_add(1, Ordering::Relaxed);
    }

    if message.is_settled() {
        tracing::debug!(disposition = ?message.disposition(), "settled by handler");
        outcomes.record(message.disposition());
        return;
    }

    match result {
        Ok(produced) => {
            if !produced.is_empty() {
                tracing::debug!(
                    count = produced.len(),
                    "no output configured, dropping produced messages"
                );
            }
            message.ack();
            tracing::debug!("acked");
        }
        Err(e @ HandlerError::Permanent(_)) => {
            tracing::error!(error = %e, "dropping message after permanent failure");
            message.ack();
        }
        Err(e) => {
            tracing::warn!(error = %e, "processing failed, nacking for redelivery");
            message.nack();
        }
    }
    outcomes.record(message.disposition());
}

fn reap(result: Result<(), JoinError>, outcomes: &Outcomes) {
    if let Err(e) = result {
        // Only reachable if something outside the handler panicked
        tracing::error!(error = %e, "processing task failed");
        if e.is_panic() {
            outcomes.panicked.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;

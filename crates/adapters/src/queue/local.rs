// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process broker with an optional on-disk journal
//!
//! Every publish, subscription and acknowledgment is journaled before it takes
//! effect, so a broker reopened on the same directory redelivers whatever was
//! still unacknowledged. Opening rewrites the journal down to the operations
//! that rebuild the current state. A nacked delivery is redelivered to the
//! same subscription after the configured delay.

use super::{subscription_name, Publisher, QueueError, Subscriber, Subscription};
use async_trait::async_trait;
use em_core::{Disposition, QueueOp, QueuedMessage, Settle};
use em_storage::{QueueState, StoredMessage, Wal};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::mpsc;

const JOURNAL_FILE: &str = "queue.wal";

/// A message on one subscription: `(subscription, message id)`
type DeliveryKey = (String, String);

fn delivery_key(subscription: &str, id: &str) -> DeliveryKey {
    (subscription.to_string(), id.to_string())
}

/// Broker shared by the webhook publisher and the dispatcher
#[derive(Clone)]
pub struct LocalBroker {
    inner: Arc<Inner>,
}

struct Inner {
    prefix: String,
    redelivery_delay: Duration,
    state: Mutex<BrokerState>,
}

#[derive(Default)]
struct BrokerState {
    queue: QueueState,
    journal: Option<Wal>,
    consumers: HashMap<String, mpsc::UnboundedSender<QueuedMessage>>,
    /// Attempt number of the latest delivery handed to a consumer
    attempts: HashMap<DeliveryKey, u32>,
    /// Nacked deliveries whose redelivery timer is armed
    scheduled: HashSet<DeliveryKey>,
    closed: bool,
}

impl BrokerState {
    fn record(&mut self, op: QueueOp) -> Result<(), QueueError> {
        if let Some(journal) = self.journal.as_mut() {
            journal.append(&op)?;
        }
        self.queue.apply(&op);
        Ok(())
    }
}

impl LocalBroker {
    /// Broker that keeps everything in memory
    pub fn in_memory(prefix: impl Into<String>, redelivery_delay: Duration) -> Self {
        Self::from_state(prefix.into(), redelivery_delay, BrokerState::default())
    }

    /// Broker journaled under `dir`, replaying any existing journal
    pub fn open(
        dir: &Path,
        prefix: impl Into<String>,
        redelivery_delay: Duration,
    ) -> Result<Self, QueueError> {
        std::fs::create_dir_all(dir).map_err(em_storage::WalError::from)?;
        let path = dir.join(JOURNAL_FILE);

        let ops = Wal::replay(&path)?;
        let queue = QueueState::replay(&ops);
        let snapshot = queue.snapshot();
        let journal = Wal::rewrite(&path, &snapshot)?;
        tracing::info!(
            path = %path.display(),
            entries = ops.len(),
            compacted = snapshot.len(),
            stored = queue.stored_messages(),
            "journal replayed"
        );

        let state = BrokerState {
            queue,
            journal: Some(journal),
            ..BrokerState::default()
        };
        Ok(Self::from_state(prefix.into(), redelivery_delay, state))
    }

    fn from_state(prefix: String, redelivery_delay: Duration, state: BrokerState) -> Self {
        Self {
            inner: Arc::new(Inner {
                prefix,
                redelivery_delay,
                state: Mutex::new(state),
            }),
        }
    }

    /// Stop accepting publishes and end every open subscription stream.
    ///
    /// Deliveries already handed out can still be acknowledged.
    pub fn close(&self) {
        let mut state = self.inner.lock();
        state.closed = true;
        state.consumers.clear();
        tracing::debug!("broker closed");
    }

    /// Unacknowledged messages on this broker's subscription to `topic`
    pub fn pending(&self, topic: &str) -> usize {
        let name = subscription_name(&self.inner.prefix, topic);
        self.inner.lock().queue.pending(&name).len()
    }

    fn publish_batch(&self, topic: &str, messages: Vec<QueuedMessage>) -> Result<(), QueueError> {
        let mut state = self.inner.lock();
        if state.closed {
            return Err(QueueError::Closed);
        }

        for message in messages {
            if state.queue.contains(&message.id) {
                tracing::warn!(message_id = %message.id, topic, "duplicate message id, skipping");
                continue;
            }
            state.record(QueueOp::Published {
                topic: topic.to_string(),
                id: message.id.clone(),
                payload: message.payload.clone(),
                metadata: message.metadata.clone(),
            })?;

            for subscription in state.queue.subscriptions_for(topic) {
                let delivery = fresh_delivery(&message);
                self.inner.deliver(&mut state, &subscription, delivery);
            }
        }
        Ok(())
    }

    fn open_subscription(&self, topic: &str) -> Result<Subscription, QueueError> {
        let name = subscription_name(&self.inner.prefix, topic);
        let mut state = self.inner.lock();
        if state.closed {
            return Err(QueueError::Closed);
        }
        if state
            .consumers
            .get(&name)
            .is_some_and(|tx| !tx.is_closed())
        {
            return Err(QueueError::AlreadySubscribed(name));
        }

        if !state.queue.has_subscription(&name) {
            state.record(QueueOp::Subscribed {
                topic: topic.to_string(),
                subscription: name.clone(),
            })?;
        }

        let (tx, subscription) = Subscription::channel(name.clone());
        state.consumers.insert(name.clone(), tx);

        let backlog = state.queue.pending(&name);
        tracing::info!(subscription = %name, topic, pending = backlog.len(), "subscribed");
        for stored in &backlog {
            let key = delivery_key(&name, &stored.id);
            // The armed timer hands it to this stream
            if state.scheduled.contains(&key) {
                continue;
            }
            let mut message = stored_delivery(stored);
            if let Some(attempt) = state.attempts.get(&key) {
                message.attempt = attempt.saturating_add(1);
            }
            self.inner.deliver(&mut state, &name, message);
        }

        Ok(subscription)
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Hand a delivery to the subscription's live consumer, if any.
    ///
    /// Without a consumer the message stays pending until one subscribes.
    fn deliver(
        self: &Arc<Self>,
        state: &mut BrokerState,
        subscription: &str,
        message: QueuedMessage,
    ) {
        let Some(tx) = state.consumers.get(subscription) else {
            return;
        };
        let sink = Arc::new(Delivery {
            broker: Arc::downgrade(self),
            subscription: subscription.to_string(),
        });
        let key = delivery_key(subscription, &message.id);
        let attempt = message.attempt;
        if tx.send(message.bind(sink)).is_err() {
            tracing::debug!(subscription, "consumer gone, dropping stream");
            state.consumers.remove(subscription);
            return;
        }
        state.attempts.insert(key, attempt);
    }

    fn acknowledge(&self, subscription: &str, id: &str) {
        let mut state = self.lock();
        let key = delivery_key(subscription, id);
        state.attempts.remove(&key);
        state.scheduled.remove(&key);
        if !state.queue.is_pending(subscription, id) {
            return;
        }
        let op = QueueOp::Acked {
            subscription: subscription.to_string(),
            id: id.to_string(),
        };
        match state.record(op) {
            Ok(()) => tracing::debug!(subscription, message_id = id, "acked"),
            Err(e) => tracing::error!(subscription, message_id = id, error = %e, "failed to journal ack"),
        }
    }

    fn schedule_redelivery(self: Arc<Self>, subscription: &str, message: &QueuedMessage) {
        let next = message.redelivery();
        let subscription = subscription.to_string();
        tracing::debug!(
            subscription = %subscription,
            message_id = %next.id,
            attempt = next.attempt,
            delay_ms = self.redelivery_delay.as_millis() as u64,
            "scheduling redelivery"
        );

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                self.lock()
                    .scheduled
                    .insert(delivery_key(&subscription, &next.id));
                let delay = self.redelivery_delay;
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    self.redeliver(&subscription, next);
                });
            }
            Err(_) => self.redeliver(&subscription, next),
        }
    }

    fn redeliver(self: &Arc<Self>, subscription: &str, message: QueuedMessage) {
        let mut state = self.lock();
        state.scheduled.remove(&delivery_key(subscription, &message.id));
        if state.closed || !state.queue.is_pending(subscription, &message.id) {
            return;
        }
        self.deliver(&mut state, subscription, message);
    }
}

/// Settlement sink bound to one delivery
struct Delivery {
    broker: Weak<Inner>,
    subscription: String,
}

impl Settle for Delivery {
    fn settle(&self, message: &QueuedMessage, disposition: Disposition) {
        let Some(broker) = self.broker.upgrade() else {
            return;
        };
        match disposition {
            Disposition::Ack => broker.acknowledge(&self.subscription, &message.id),
            Disposition::Nack => broker.schedule_redelivery(&self.subscription, message),
        }
    }
}

fn fresh_delivery(source: &QueuedMessage) -> QueuedMessage {
    let mut message = QueuedMessage::new(source.id.as_str(), source.payload.as_slice());
    message.metadata = source.metadata.clone();
    message
}

fn stored_delivery(stored: &StoredMessage) -> QueuedMessage {
    let mut message = QueuedMessage::new(stored.id.as_str(), stored.payload.as_slice());
    message.metadata = stored.metadata.clone();
    message
}

#[async_trait]
impl Publisher for LocalBroker {
    async fn publish(&self, topic: &str, messages: Vec<QueuedMessage>) -> Result<(), QueueError> {
        self.publish_batch(topic, messages)
    }
}

#[async_trait]
impl Subscriber for LocalBroker {
    async fn subscribe(&self, topic: &str) -> Result<Subscription, QueueError> {
        self.open_subscription(topic)
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;

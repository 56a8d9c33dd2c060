// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue state materialized from journal operations
//!
//! A message published to a topic becomes pending on every subscription the
//! topic has at that moment. A topic with no subscription keeps a backlog
//! that the first subscription created for it inherits.

use em_core::{Metadata, QueueOp};
use std::collections::{BTreeMap, HashMap};

/// A message body held until every subscription has acknowledged it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: String,
    pub topic: String,
    pub payload: Vec<u8>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
struct HeldMessage {
    /// Position in publish order
    order: u64,
    message: StoredMessage,
}

#[derive(Debug, Clone)]
struct SubscriptionState {
    topic: String,
    /// Unacknowledged message ids in publish order
    pending: Vec<String>,
}

/// Materialized broker state
#[derive(Debug, Default)]
pub struct QueueState {
    subscriptions: BTreeMap<String, SubscriptionState>,
    backlog: BTreeMap<String, Vec<String>>,
    messages: HashMap<String, HeldMessage>,
    published: u64,
}

impl QueueState {
    /// Rebuild state from a sequence of operations
    pub fn replay<'a>(ops: impl IntoIterator<Item = &'a QueueOp>) -> Self {
        let mut state = Self::default();
        for op in ops {
            state.apply(op);
        }
        state
    }

    /// Apply an operation to update the state
    pub fn apply(&mut self, op: &QueueOp) {
        match op {
            QueueOp::Subscribed {
                topic,
                subscription,
            } => {
                if self.subscriptions.contains_key(subscription) {
                    return;
                }
                let pending = self.backlog.remove(topic).unwrap_or_default();
                self.subscriptions.insert(
                    subscription.clone(),
                    SubscriptionState {
                        topic: topic.clone(),
                        pending,
                    },
                );
            }

            QueueOp::Published {
                topic,
                id,
                payload,
                metadata,
            } => {
                if self.messages.contains_key(id) {
                    return;
                }
                self.published += 1;
                self.messages.insert(
                    id.clone(),
                    HeldMessage {
                        order: self.published,
                        message: StoredMessage {
                            id: id.clone(),
                            topic: topic.clone(),
                            payload: payload.clone(),
                            metadata: metadata.clone(),
                        },
                    },
                );

                let mut delivered = false;
                for sub in self.subscriptions.values_mut() {
                    if sub.topic == *topic {
                        sub.pending.push(id.clone());
                        delivered = true;
                    }
                }
                if !delivered {
                    self.backlog
                        .entry(topic.clone())
                        .or_default()
                        .push(id.clone());
                }
            }

            QueueOp::Acked { subscription, id } => {
                if let Some(sub) = self.subscriptions.get_mut(subscription) {
                    sub.pending.retain(|pending| pending != id);
                }
                if !self.is_referenced(id) {
                    self.messages.remove(id);
                }
            }
        }
    }

    /// Whether a message body with this id is held
    pub fn contains(&self, id: &str) -> bool {
        self.messages.contains_key(id)
    }

    /// Whether a subscription with this name exists
    pub fn has_subscription(&self, subscription: &str) -> bool {
        self.subscriptions.contains_key(subscription)
    }

    /// Subscriptions attached to a topic
    pub fn subscriptions_for(&self, topic: &str) -> Vec<String> {
        self.subscriptions
            .iter()
            .filter(|(_, sub)| sub.topic == topic)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Unacknowledged messages for a subscription, in publish order
    pub fn pending(&self, subscription: &str) -> Vec<StoredMessage> {
        self.subscriptions
            .get(subscription)
            .map(|sub| {
                sub.pending
                    .iter()
                    .filter_map(|id| self.messages.get(id))
                    .map(|held| held.message.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether a message is still pending on a subscription
    pub fn is_pending(&self, subscription: &str, id: &str) -> bool {
        self.subscriptions
            .get(subscription)
            .is_some_and(|sub| sub.pending.iter().any(|p| p == id))
    }

    /// Messages retained for a topic that has no subscription yet
    pub fn backlog_len(&self, topic: &str) -> usize {
        self.backlog.get(topic).map_or(0, Vec::len)
    }

    /// Number of message bodies still held
    pub fn stored_messages(&self) -> usize {
        self.messages.len()
    }

    /// Operations that rebuild this state from scratch.
    ///
    /// Backlogged messages come first, then every subscription, then the
    /// remaining messages in publish order, each followed by acks for the
    /// subscriptions that no longer hold it.
    pub fn snapshot(&self) -> Vec<QueueOp> {
        let mut ops = Vec::new();

        for ids in self.backlog.values() {
            for id in ids {
                if let Some(held) = self.messages.get(id) {
                    ops.push(published_op(&held.message));
                }
            }
        }

        for (name, sub) in &self.subscriptions {
            ops.push(QueueOp::Subscribed {
                topic: sub.topic.clone(),
                subscription: name.clone(),
            });
        }

        let mut delivered: Vec<&HeldMessage> = self
            .messages
            .values()
            .filter(|held| {
                self.subscriptions
                    .values()
                    .any(|sub| sub.topic == held.message.topic)
            })
            .collect();
        delivered.sort_by_key(|held| held.order);

        for held in delivered {
            let message = &held.message;
            ops.push(published_op(message));
            for (name, sub) in &self.subscriptions {
                if sub.topic == message.topic && !sub.pending.contains(&message.id) {
                    ops.push(QueueOp::Acked {
                        subscription: name.clone(),
                        id: message.id.clone(),
                    });
                }
            }
        }

        ops
    }

    fn is_referenced(&self, id: &str) -> bool {
        self.subscriptions
            .values()
            .any(|sub| sub.pending.iter().any(|p| p == id))
            || self
                .backlog
                .values()
                .any(|ids| ids.iter().any(|p| p == id))
    }
}

fn published_op(message: &StoredMessage) -> QueueOp {
    QueueOp::Published {
        topic: message.topic.clone(),
        id: message.id.clone(),
        payload: message.payload.clone(),
        metadata: message.metadata.clone(),
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;

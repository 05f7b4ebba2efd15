//! Subscription and event-binding registries.
//!
//! Both registries are shared between the session's public operations and
//! the background dispatch loop, so each guards its map with a tokio lock.
//! The binding table is only ever mutated through `bind`/`unbind`; the
//! dispatch loop takes read access exclusively.

use std::collections::{HashMap, HashSet};

use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, warn};

use pusher_core::error::{PusherError, PusherResult};

use crate::protocol::Envelope;

/// The set of channel names currently subscribed.
#[derive(Default)]
pub struct SubscriptionSet {
    inner: Mutex<HashSet<String>>,
}

impl SubscriptionSet {
    /// Create an empty subscription set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the channel is currently a member.
    pub async fn contains(&self, channel: &str) -> bool {
        self.inner.lock().await.contains(channel)
    }

    /// Add a channel after its subscribe request has been sent.
    pub async fn insert(&self, channel: &str) {
        self.inner.lock().await.insert(channel.to_string());
    }

    /// Remove a channel after its unsubscribe request has been sent.
    pub async fn remove(&self, channel: &str) -> bool {
        self.inner.lock().await.remove(channel)
    }

    /// Snapshot of the subscribed channel names.
    pub async fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.inner.lock().await.iter().cloned().collect();
        channels.sort();
        channels
    }

    /// Number of subscribed channels.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether no channels are subscribed.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

/// Outcome of a dispatch-loop delivery attempt, mostly for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The envelope was handed to the bound channel.
    Delivered,
    /// No channel is bound for this event name; the envelope was dropped.
    Unbound,
    /// The bound channel is full; the envelope was dropped.
    Overflow,
    /// The consumer dropped its receiver; the envelope was dropped.
    ConsumerGone,
}

/// Mapping from event name to the consumer-facing delivery channel.
#[derive(Default)]
pub struct BindingTable {
    inner: RwLock<HashMap<String, mpsc::Sender<Envelope>>>,
}

impl BindingTable {
    /// Create an empty binding table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a delivery channel for an event name.
    ///
    /// Fails if the event name is already bound; the existing binding and
    /// its receiver are unaffected.
    pub async fn bind(
        &self,
        event: &str,
        capacity: usize,
    ) -> PusherResult<mpsc::Receiver<Envelope>> {
        let mut table = self.inner.write().await;
        if table.contains_key(event) {
            return Err(PusherError::AlreadyBound(event.to_string()));
        }
        let (tx, rx) = mpsc::channel(capacity);
        table.insert(event.to_string(), tx);
        Ok(rx)
    }

    /// Remove the binding for an event name. No error if absent.
    ///
    /// The channel is not drained or closed here; the consumer simply stops
    /// receiving new envelopes once its sender is dropped from the table.
    pub async fn unbind(&self, event: &str) {
        self.inner.write().await.remove(event);
    }

    /// Whether the event name has a binding.
    pub async fn is_bound(&self, event: &str) -> bool {
        self.inner.read().await.contains_key(event)
    }

    /// Deliver an envelope to its bound channel, if any.
    ///
    /// Non-blocking by design: a full consumer channel must never stall the
    /// dispatch loop, so overflow drops the envelope with a warning instead
    /// of waiting.
    pub async fn deliver(&self, envelope: Envelope) -> Delivery {
        let table = self.inner.read().await;
        let Some(tx) = table.get(&envelope.event) else {
            debug!("no binding for event {}, dropping", envelope.event);
            return Delivery::Unbound;
        };

        match tx.try_send(envelope) {
            Ok(()) => Delivery::Delivered,
            Err(mpsc::error::TrySendError::Full(envelope)) => {
                warn!(
                    "delivery channel for {} is full, dropping envelope",
                    envelope.event
                );
                Delivery::Overflow
            }
            Err(mpsc::error::TrySendError::Closed(envelope)) => {
                debug!("consumer for {} is gone, dropping envelope", envelope.event);
                Delivery::ConsumerGone
            }
        }
    }

    /// Number of active bindings.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Whether the table has no bindings.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscription_set_membership() {
        let set = SubscriptionSet::new();
        assert!(!set.contains("room1").await);

        set.insert("room1").await;
        assert!(set.contains("room1").await);
        assert_eq!(set.channels().await, vec!["room1".to_string()]);

        assert!(set.remove("room1").await);
        assert!(!set.remove("room1").await);
        assert!(set.is_empty().await);
    }

    #[tokio::test]
    async fn test_bind_rejects_duplicate() {
        let table = BindingTable::new();
        let _rx = table.bind("chat-message", 4).await.unwrap();

        let err = table.bind("chat-message", 4).await.unwrap_err();
        assert!(matches!(err, PusherError::AlreadyBound(_)));
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn test_first_binding_survives_duplicate_bind() {
        let table = BindingTable::new();
        let mut rx = table.bind("chat-message", 4).await.unwrap();
        let _ = table.bind("chat-message", 4).await.unwrap_err();

        let envelope = Envelope::new("chat-message", "{}");
        assert_eq!(table.deliver(envelope).await, Delivery::Delivered);
        assert_eq!(rx.recv().await.unwrap().event, "chat-message");
    }

    #[tokio::test]
    async fn test_unbind_is_noop_when_absent() {
        let table = BindingTable::new();
        table.unbind("never-bound").await;
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_deliver_unbound_drops() {
        let table = BindingTable::new();
        let outcome = table.deliver(Envelope::new("nobody-home", "{}")).await;
        assert_eq!(outcome, Delivery::Unbound);
    }

    #[tokio::test]
    async fn test_deliver_overflow_does_not_block() {
        let table = BindingTable::new();
        let _rx = table.bind("busy", 1).await.unwrap();

        assert_eq!(
            table.deliver(Envelope::new("busy", "{}")).await,
            Delivery::Delivered
        );
        // Channel is full; the second delivery must return immediately.
        assert_eq!(
            table.deliver(Envelope::new("busy", "{}")).await,
            Delivery::Overflow
        );
    }

    #[tokio::test]
    async fn test_deliver_after_unbind_drops() {
        let table = BindingTable::new();
        let mut rx = table.bind("short-lived", 4).await.unwrap();
        table.unbind("short-lived").await;

        assert_eq!(
            table.deliver(Envelope::new("short-lived", "{}")).await,
            Delivery::Unbound
        );
        // Sender was dropped from the table, so the receiver observes the end.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_deliver_to_dropped_consumer() {
        let table = BindingTable::new();
        let rx = table.bind("gone", 4).await.unwrap();
        drop(rx);

        assert_eq!(
            table.deliver(Envelope::new("gone", "{}")).await,
            Delivery::ConsumerGone
        );
    }
}

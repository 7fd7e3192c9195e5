//! Cross-context message delivery
//!
//! Stands in for the host's message bus between the requester and isolated
//! contexts. Every subscriber sees every delivered message along with the
//! sender's origin; filtering is the subscriber's job.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

/// A message as seen by a listener: payload plus sender origin
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub origin: String,
    pub data: Value,
}

impl InboundMessage {
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }

    /// The `type` discriminator, if the payload carries one
    pub fn message_type(&self) -> Option<&str> {
        self.data.get("type").and_then(Value::as_str)
    }
}

#[derive(Default)]
pub struct MessageHub {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, mpsc::UnboundedSender<InboundMessage>>>,
}

impl MessageHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, mpsc::UnboundedSender<InboundMessage>>> {
        // a panicked sender cannot leave the map half-updated
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a listener; it is removed when the returned handle drops
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().insert(id, tx);
        trace!(subscription = id, "Subscribed");
        Subscription {
            id,
            hub: Arc::clone(self),
            rx,
        }
    }

    /// Fan a message out to every current listener; returns how many got it
    pub fn deliver(&self, message: InboundMessage) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|_, tx| !tx.is_closed());
        let mut delivered = 0;
        for tx in subscribers.values() {
            if tx.send(message.clone()).is_ok() {
                delivered += 1;
            }
        }
        trace!(origin = %message.origin, delivered, "Delivered message");
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn unsubscribe(&self, id: u64) {
        self.lock().remove(&id);
        trace!(subscription = id, "Unsubscribed");
    }
}

/// Listener handle
pub struct Subscription {
    id: u64,
    hub: Arc<MessageHub>,
    rx: mpsc::UnboundedReceiver<InboundMessage>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<InboundMessage> {
        self.rx.recv().await
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}

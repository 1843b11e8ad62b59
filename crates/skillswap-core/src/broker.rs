//! Live update fan-out.
//!
//! The [`Broker`] pushes ledger and message mutations to registered
//! observers without polling.  Subscriptions are explicit handles carrying
//! their own cancellation; dropping a handle releases its registration
//! synchronously, so no rendering framework is needed to keep the
//! bookkeeping straight.
//!
//! Delivery guarantees: per conversation, all subscribers observe appended
//! messages in append order.  A subscriber that races a concurrent append
//! during its history replay may see the same message twice (replay plus
//! live); events carry stable ids, so consumers can deduplicate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use skillswap_shared::{ConversationId, UserId};
use skillswap_store::{ChatRequest, Message};
use tokio::sync::mpsc;

/// What a subscription is keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Chat requests addressed to a user (created or status change).
    Requests(UserId),
    /// Message appends in one conversation.
    Conversation(ConversationId),
}

/// An observable mutation of the ledger or the message store.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ChatEvent {
    /// A new pending request was created.
    RequestCreated(ChatRequest),
    /// A pending request transitioned to accepted.
    RequestAccepted(ChatRequest),
    /// A message was appended to a conversation.
    MessageAppended(Message),
}

type Registration = (u64, mpsc::UnboundedSender<ChatEvent>);

struct BrokerInner {
    registry: Mutex<HashMap<Topic, Vec<Registration>>>,
    next_id: AtomicU64,
}

/// Subscription registry and event fan-out.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

impl Broker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                registry: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register an observer for `topic` and return its handle.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        self.subscribe_with_replay(topic, Vec::new())
    }

    /// Register an observer whose first received events are `replay`,
    /// delivered before any live event that arrives after registration.
    pub(crate) fn subscribe_with_replay(
        &self,
        topic: Topic,
        replay: Vec<ChatEvent>,
    ) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        {
            let mut registry = self.inner.registry.lock().expect("broker lock poisoned");
            registry.entry(topic.clone()).or_default().push((id, tx));
        }

        tracing::debug!(id, ?topic, replayed = replay.len(), "subscription registered");

        Subscription {
            id,
            topic,
            replay: replay.into(),
            rx,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every live subscriber of `topic`.
    ///
    /// Closed receivers are pruned along the way.
    pub fn publish(&self, topic: &Topic, event: ChatEvent) {
        let mut registry = self.inner.registry.lock().expect("broker lock poisoned");

        if let Some(subscribers) = registry.get_mut(topic) {
            subscribers.retain(|(_, tx)| tx.send(event.clone()).is_ok());
            if subscribers.is_empty() {
                registry.remove(topic);
            }
        }
    }

    /// Number of live registrations for a topic.
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        let registry = self.inner.registry.lock().expect("broker lock poisoned");
        registry.get(topic).map_or(0, Vec::len)
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one live registration in the [`Broker`].
///
/// Events are consumed with [`recv`](Subscription::recv) /
/// [`try_recv`](Subscription::try_recv).  Call
/// [`cancel`](Subscription::cancel) (or drop the handle) to release the
/// registration; cancellation is synchronous and safe from any context,
/// including while events are still in flight.
pub struct Subscription {
    id: u64,
    topic: Topic,
    replay: std::collections::VecDeque<ChatEvent>,
    rx: mpsc::UnboundedReceiver<ChatEvent>,
    inner: std::sync::Weak<BrokerInner>,
}

impl Subscription {
    /// Topic this subscription is registered on.
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Set the replay buffer.  Only valid before the handle is given to
    /// its consumer; the service uses this to replay state read after the
    /// registration was already live.
    pub(crate) fn preload(&mut self, events: Vec<ChatEvent>) {
        self.replay = events.into();
    }

    /// Wait for the next event.  Replayed events come first, then live
    /// ones.  Returns `None` after cancellation once the buffer is empty.
    pub async fn recv(&mut self) -> Option<ChatEvent> {
        if let Some(event) = self.replay.pop_front() {
            return Some(event);
        }
        self.rx.recv().await
    }

    /// Non-blocking variant of [`recv`](Subscription::recv); `None` when
    /// nothing is buffered right now.
    pub fn try_recv(&mut self) -> Option<ChatEvent> {
        if let Some(event) = self.replay.pop_front() {
            return Some(event);
        }
        self.rx.try_recv().ok()
    }

    /// Remove this registration from the broker.  Idempotent.
    pub fn cancel(&mut self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };

        let mut registry = inner.registry.lock().expect("broker lock poisoned");
        if let Some(subscribers) = registry.get_mut(&self.topic) {
            subscribers.retain(|(id, _)| *id != self.id);
            if subscribers.is_empty() {
                registry.remove(&self.topic);
            }
        }

        tracing::debug!(id = self.id, topic = ?self.topic, "subscription cancelled");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

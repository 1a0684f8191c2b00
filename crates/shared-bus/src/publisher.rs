//! # Message Bus
//!
//! The bus interface both actors depend on, and its in-process implementation.

use crate::error::BusError;
use crate::queue::{QueueChannel, WorkConsumer};
use crate::subscriber::TopicSubscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Work queue and topic primitives of an external message broker.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Append a message to a work queue. Queues are created on first use.
    async fn push(&self, queue: &str, payload: Vec<u8>) -> Result<(), BusError>;

    /// Attach a competing consumer to a work queue.
    async fn consume(&self, queue: &str) -> Result<WorkConsumer, BusError>;

    /// Broadcast to every current subscriber of a topic.
    ///
    /// Returns how many subscribers received the message.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<usize, BusError>;

    /// Subscribe to a topic.
    async fn subscribe(&self, topic: &str) -> Result<TopicSubscription, BusError>;
}

fn check_name(name: &str) -> Result<(), BusError> {
    if name.trim().is_empty() {
        return Err(BusError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// In-process message bus on tokio channels.
///
/// Queues are unbounded mpsc channels shared by their consumers; topics are
/// broadcast channels of [`DEFAULT_CHANNEL_CAPACITY`] (or the configured)
/// capacity.
pub struct InMemoryMessageBus {
    queues: RwLock<HashMap<String, QueueChannel>>,
    topics: RwLock<HashMap<String, broadcast::Sender<Vec<u8>>>>,
    capacity: usize,
    messages_pushed: AtomicU64,
    messages_published: AtomicU64,
}

impl InMemoryMessageBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            topics: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            messages_pushed: AtomicU64::new(0),
            messages_published: AtomicU64::new(0),
        }
    }

    fn with_queue<T>(&self, queue: &str, f: impl FnOnce(&QueueChannel) -> T) -> Result<T, BusError> {
        if let Some(channel) = self.queues.read().map_err(|_| BusError::Closed)?.get(queue) {
            return Ok(f(channel));
        }
        let mut queues = self.queues.write().map_err(|_| BusError::Closed)?;
        let channel = queues
            .entry(queue.to_string())
            .or_insert_with(QueueChannel::new);
        Ok(f(channel))
    }

    fn topic_sender(&self, topic: &str) -> Result<broadcast::Sender<Vec<u8>>, BusError> {
        if let Some(sender) = self.topics.read().map_err(|_| BusError::Closed)?.get(topic) {
            return Ok(sender.clone());
        }
        let mut topics = self.topics.write().map_err(|_| BusError::Closed)?;
        let sender = topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        Ok(sender.clone())
    }

    #[must_use]
    pub fn messages_pushed(&self) -> u64 {
        self.messages_pushed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn push(&self, queue: &str, payload: Vec<u8>) -> Result<(), BusError> {
        check_name(queue)?;
        self.with_queue(queue, |channel| channel.sender.send(payload))?
            .map_err(|_| BusError::Closed)?;
        self.messages_pushed.fetch_add(1, Ordering::Relaxed);
        trace!(queue, "Message pushed");
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<WorkConsumer, BusError> {
        check_name(queue)?;
        let consumer = self.with_queue(queue, |channel| channel.consumer(queue))?;
        debug!(queue, "Consumer attached");
        Ok(consumer)
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<usize, BusError> {
        check_name(topic)?;
        let sender = self.topic_sender(topic)?;
        self.messages_published.fetch_add(1, Ordering::Relaxed);
        // No subscribers is not an error on a topic
        let receivers = sender.send(payload).unwrap_or(0);
        trace!(topic, receivers, "Message published");
        Ok(receivers)
    }

    async fn subscribe(&self, topic: &str) -> Result<TopicSubscription, BusError> {
        check_name(topic)?;
        let receiver = self.topic_sender(topic)?.subscribe();
        debug!(topic, "Topic subscription created");
        Ok(TopicSubscription::new(topic, receiver))
    }
}

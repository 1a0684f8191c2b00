//! # Work Queues
//!
//! Competing consumers over one named queue. Each message goes to exactly one
//! consumer; it returns to the queue if that consumer drops it unacknowledged.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

type SharedReceiver = Arc<Mutex<mpsc::UnboundedReceiver<Vec<u8>>>>;

/// Both ends of one named queue, owned by the bus.
pub(crate) struct QueueChannel {
    pub(crate) sender: mpsc::UnboundedSender<Vec<u8>>,
    receiver: SharedReceiver,
}

impl QueueChannel {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    pub(crate) fn consumer(&self, queue: &str) -> WorkConsumer {
        WorkConsumer {
            queue: queue.to_string(),
            receiver: self.receiver.clone(),
            requeue: self.sender.clone(),
        }
    }
}

/// A consumer attached to one work queue.
pub struct WorkConsumer {
    queue: String,
    receiver: SharedReceiver,
    requeue: mpsc::UnboundedSender<Vec<u8>>,
}

impl WorkConsumer {
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Wait for the next message. `None` once the queue is closed.
    ///
    /// Cancel safe: a message is only taken off the queue when this returns.
    pub async fn next(&mut self) -> Option<Delivery> {
        let payload = self.receiver.lock().await.recv().await?;
        Some(Delivery {
            queue: self.queue.clone(),
            payload,
            requeue: Some(self.requeue.clone()),
        })
    }
}

/// One message taken off a work queue.
#[derive(Debug)]
pub struct Delivery {
    queue: String,
    payload: Vec<u8>,
    requeue: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

impl Delivery {
    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Acknowledge: the message will not be redelivered.
    pub fn ack(mut self) -> Vec<u8> {
        self.requeue = None;
        std::mem::take(&mut self.payload)
    }

    /// Reject and put the message back on its queue.
    pub fn nack(self) {
        drop(self);
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if let Some(requeue) = self.requeue.take() {
            debug!(queue = %self.queue, "Unacknowledged delivery returned to queue");
            let _ = requeue.send(std::mem::take(&mut self.payload));
        }
    }
}

//! # Topic Subscriber
//!
//! Receiving side of a publish/subscribe topic.

use crate::error::BusError;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::{debug, warn};

/// A live subscription to one topic.
///
/// Only messages published after the subscription was created are seen.
pub struct TopicSubscription {
    topic: String,
    receiver: broadcast::Receiver<Vec<u8>>,
}

impl TopicSubscription {
    pub(crate) fn new(topic: &str, receiver: broadcast::Receiver<Vec<u8>>) -> Self {
        Self {
            topic: topic.to_string(),
            receiver,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Receive the next message.
    ///
    /// Lagging skips the dropped messages and keeps going; `None` once the
    /// topic is closed.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.receiver.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(topic = %self.topic, lagged = count, "Subscriber lagged, messages dropped");
                }
            }
        }
    }

    /// Receive without waiting.
    pub fn try_recv(&mut self) -> Result<Option<Vec<u8>>, BusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(payload) => return Ok(Some(payload)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(BusError::Closed),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            }
        }
    }

    pub fn into_stream(self) -> TopicStream {
        debug!(topic = %self.topic, "Subscription converted to stream");
        TopicStream {
            topic: self.topic,
            inner: BroadcastStream::new(self.receiver),
        }
    }
}

/// [`Stream`] over a topic, for use with stream combinators.
pub struct TopicStream {
    topic: String,
    inner: BroadcastStream<Vec<u8>>,
}

impl TopicStream {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Stream for TopicStream {
    type Item = Vec<u8>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(payload))) => return Poll::Ready(Some(payload)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    warn!(topic = %self.topic, lagged = count, "Stream lagged, messages dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

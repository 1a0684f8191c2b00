//! Farmer reliability bookkeeping.
//!
//! Runs after the caller already has its answer. Nothing here is allowed to
//! fail the request: lookup and save errors are logged and dropped.
//!
//! Each update is a load, modify and save of one contact, so updates are
//! applied one at a time by a single task ([`ReliabilityRecorder::spawn`]);
//! two outcomes for the same farmer never overwrite each other.

use shared_types::{now_millis, Contact, ContactStore, NodeId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A job outcome to fold into a farmer's contact.
#[derive(Debug, Clone, PartialEq)]
pub enum ReliabilitySample {
    Timeout { node_id: String },
    Success { node_id: String, elapsed: Duration },
}

/// Updates farmer contacts from job outcomes.
#[derive(Clone)]
pub struct ReliabilityRecorder {
    contacts: Arc<dyn ContactStore>,
    request_timeout: Duration,
    timeout_rate_threshold: f64,
}

impl ReliabilityRecorder {
    pub fn new(
        contacts: Arc<dyn ContactStore>,
        request_timeout: Duration,
        timeout_rate_threshold: f64,
    ) -> Self {
        Self {
            contacts,
            request_timeout,
            timeout_rate_threshold,
        }
    }

    /// Apply samples in arrival order until every sender is dropped.
    pub fn spawn(self) -> (mpsc::UnboundedSender<ReliabilitySample>, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            while let Some(sample) = rx.recv().await {
                self.record(sample).await;
            }
            debug!("Reliability recorder stopped");
        });
        (tx, task)
    }

    pub async fn record(&self, sample: ReliabilitySample) -> Option<Contact> {
        match sample {
            ReliabilitySample::Timeout { node_id } => self.record_timeout(&node_id).await,
            ReliabilitySample::Success { node_id, elapsed } => {
                self.record_success(&node_id, elapsed).await
            }
        }
    }

    /// A job to `node_id` timed out.
    ///
    /// Counts a timeout failure, warns if the farmer's shards need
    /// replication, and records the full timeout as its response time.
    pub async fn record_timeout(&self, node_id: &str) -> Option<Contact> {
        let mut contact = self.lookup(node_id).await?;

        contact.record_timeout_failure(now_millis());
        if contact.timeout_rate() >= self.timeout_rate_threshold {
            warn!(
                node_id,
                timeout_rate = contact.timeout_rate(),
                threshold = self.timeout_rate_threshold,
                "Shards need replication"
            );
        }
        contact.record_response_time(self.request_timeout.as_millis() as f64);

        self.save(contact).await
    }

    /// A job to `node_id` succeeded after `elapsed`.
    pub async fn record_success(&self, node_id: &str, elapsed: Duration) -> Option<Contact> {
        let mut contact = self.lookup(node_id).await?;
        contact.record_response_time(elapsed.as_millis() as f64);
        self.save(contact).await
    }

    async fn lookup(&self, node_id: &str) -> Option<Contact> {
        let parsed: NodeId = match node_id.parse() {
            Ok(id) => id,
            Err(e) => {
                warn!(node_id, error = %e, "Unable to parse farmer node id");
                return None;
            }
        };

        match self.contacts.find_by_id(&parsed).await {
            Ok(Some(contact)) => Some(contact),
            Ok(None) => {
                warn!(node_id, "Unable to find farmer contact");
                None
            }
            Err(e) => {
                warn!(node_id, error = %e, "Unable to load farmer contact");
                None
            }
        }
    }

    async fn save(&self, contact: Contact) -> Option<Contact> {
        match self.contacts.save(&contact).await {
            Ok(()) => {
                debug!(
                    node_id = %contact.node_id,
                    response_time = ?contact.response_time,
                    timeout_rate = contact.timeout_rate(),
                    "Updated farmer reliability"
                );
                Some(contact)
            }
            Err(e) => {
                warn!(node_id = %contact.node_id, error = %e, "Unable to save farmer contact");
                None
            }
        }
    }
}

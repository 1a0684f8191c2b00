//! Job registry: request id to the HTTP caller waiting on it.
//!
//! The registry is owned by the reactor task and only touched from there, so
//! it is a plain `HashMap`. Each admission gets a sequence number; a timer
//! carries the number it was armed with and fires only if the job under that
//! id is still the same admission.

use crate::domain::error::AdmissionError;
use cx_01_sharding::RoutingTarget;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::debug;

/// How a job ended, as seen by the HTTP handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Success envelope from a renter, forwarded verbatim.
    Completed(Vec<u8>),
    /// Error envelope from a renter, carrying its message.
    Failed(String),
    /// No result arrived in time.
    TimedOut,
    /// Refused by the reactor before it became pending.
    Rejected(AdmissionError),
    /// Could not be queued.
    Unavailable(String),
}

impl JobOutcome {
    /// Label used on `cx_landlord_jobs_completed_total`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed(_) => "success",
            Self::Failed(_) | Self::Unavailable(_) => "error",
            Self::TimedOut => "timeout",
            Self::Rejected(_) => "rejected",
        }
    }
}

/// A job waiting for its result.
#[derive(Debug)]
pub struct PendingJob {
    pub id: String,
    pub method: String,
    pub target: RoutingTarget,
    pub admitted_at: Instant,
    seq: u64,
    sink: oneshot::Sender<JobOutcome>,
    timer: Option<AbortHandle>,
}

impl PendingJob {
    pub fn new(
        id: impl Into<String>,
        method: impl Into<String>,
        target: RoutingTarget,
        sink: oneshot::Sender<JobOutcome>,
    ) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            target,
            admitted_at: Instant::now(),
            seq: 0,
            sink,
            timer: None,
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn elapsed(&self) -> Duration {
        self.admitted_at.elapsed()
    }

    /// Deliver the outcome and cancel the timer.
    ///
    /// Returns false if the caller has already gone away.
    pub fn resolve(mut self, outcome: JobOutcome) -> bool {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.sink.send(outcome).is_ok()
    }
}

/// Pending jobs keyed by request id.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: HashMap<String, PendingJob>,
    next_seq: u64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a job. Returns its sequence number.
    ///
    /// An id that is already pending is refused and the new job is handed
    /// back so its caller can be answered.
    pub fn insert(&mut self, mut job: PendingJob) -> Result<u64, (AdmissionError, PendingJob)> {
        if self.jobs.contains_key(&job.id) {
            let err = AdmissionError::DuplicateId(job.id.clone());
            return Err((err, job));
        }

        self.next_seq += 1;
        job.seq = self.next_seq;
        debug!(id = %job.id, method = %job.method, seq = job.seq, "Registered pending job");
        self.jobs.insert(job.id.clone(), job);
        Ok(self.next_seq)
    }

    /// Attach the timeout timer of a pending job.
    pub fn arm(&mut self, id: &str, timer: AbortHandle) {
        match self.jobs.get_mut(id) {
            Some(job) => job.timer = Some(timer),
            None => timer.abort(),
        }
    }

    /// Remove a job for result delivery.
    pub fn take(&mut self, id: &str) -> Option<PendingJob> {
        self.jobs.remove(id)
    }

    /// Remove a job for timeout delivery, only if it is still admission `seq`.
    pub fn take_expired(&mut self, id: &str, seq: u64) -> Option<PendingJob> {
        match self.jobs.get(id) {
            Some(job) if job.seq == seq => self.jobs.remove(id),
            _ => None,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.jobs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Drop every pending job; their callers see a closed channel.
    pub fn clear(&mut self) -> usize {
        let count = self.jobs.len();
        for (_, mut job) in self.jobs.drain() {
            if let Some(timer) = job.timer.take() {
                timer.abort();
            }
        }
        count
    }
}

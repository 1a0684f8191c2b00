//! Job lifecycle reactor.
//!
//! One task owns the [`JobRegistry`]. HTTP handlers, timeout timers and the
//! result topic all reach it through a single loop:
//!
//! ```text
//! handler ──Admit──┐
//! timer ──Timeout──┼──▶ reactor ──push(work-x-NN)──▶ bus
//! result topic ────┘        │
//!                           └──JobOutcome──▶ handler
//! ```
//!
//! Each admitted job resolves exactly once: by its result or by its timer,
//! whichever reaches the reactor first.

use crate::domain::{
    JobOutcome, JobRegistry, LandlordError, PendingJob, ReliabilityRecorder, ReliabilitySample,
};
use complex_telemetry::{
    LANDLORD_JOBS_ADMITTED, LANDLORD_JOBS_COMPLETED, LANDLORD_JOBS_REJECTED,
    LANDLORD_LATE_RESULTS,
};
use cx_01_sharding::{queue_name, routing_key, routing_target};
use rand::rngs::OsRng;
use rand::Rng;
use shared_bus::{MessageBus, TopicSubscription};
use shared_types::{WorkRequest, WorkResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Commands buffered before handlers wait on the reactor.
const COMMAND_CAPACITY: usize = 1024;

pub(crate) enum Command {
    Admit {
        request: WorkRequest,
        body: Vec<u8>,
        sink: oneshot::Sender<JobOutcome>,
    },
    Timeout {
        id: String,
        seq: u64,
    },
    PendingCount {
        reply: oneshot::Sender<usize>,
    },
}

/// Cloneable handle for submitting jobs to the reactor.
#[derive(Clone)]
pub struct ReactorHandle {
    commands: mpsc::Sender<Command>,
}

impl ReactorHandle {
    /// Admit a validated request and wait for its outcome.
    ///
    /// `body` is pushed to the work queue as is.
    pub async fn submit(
        &self,
        request: WorkRequest,
        body: Vec<u8>,
    ) -> Result<JobOutcome, LandlordError> {
        let (sink, outcome) = oneshot::channel();
        self.commands
            .send(Command::Admit {
                request,
                body,
                sink,
            })
            .await
            .map_err(|_| LandlordError::ShuttingDown)?;
        outcome.await.map_err(|_| LandlordError::ShuttingDown)
    }

    /// Number of jobs currently pending.
    pub async fn pending_count(&self) -> Result<usize, LandlordError> {
        let (reply, count) = oneshot::channel();
        self.commands
            .send(Command::PendingCount { reply })
            .await
            .map_err(|_| LandlordError::ShuttingDown)?;
        count.await.map_err(|_| LandlordError::ShuttingDown)
    }
}

/// A running reactor task.
pub struct ReactorTask {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ReactorTask {
    /// Stop the loop. Pending callers see the landlord as shutting down.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            warn!(error = %e, "Reactor task ended abnormally");
        }
    }
}

/// The job lifecycle loop.
pub struct Reactor {
    registry: JobRegistry,
    bus: Arc<dyn MessageBus>,
    reliability: mpsc::UnboundedSender<ReliabilitySample>,
    request_timeout: Duration,
    timers: mpsc::Sender<Command>,
}

impl Reactor {
    /// Subscribe to the result topic and start the loop.
    ///
    /// The subscription exists before this returns, so no result for a job
    /// admitted afterwards can be missed.
    pub async fn spawn(
        bus: Arc<dyn MessageBus>,
        recorder: ReliabilityRecorder,
        request_timeout: Duration,
        result_topic: &str,
    ) -> Result<(ReactorHandle, ReactorTask), LandlordError> {
        let results = bus.subscribe(result_topic).await?;
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        // Stops once the reactor drops its sender.
        let (reliability, _recorder_task) = recorder.spawn();

        let reactor = Self {
            registry: JobRegistry::new(),
            bus,
            reliability,
            request_timeout,
            timers: commands_tx.clone(),
        };
        let task = tokio::spawn(reactor.run(commands_rx, results, shutdown_rx));

        info!(topic = result_topic, "Landlord reactor started");
        Ok((
            ReactorHandle {
                commands: commands_tx,
            },
            ReactorTask {
                shutdown: Some(shutdown_tx),
                task,
            },
        ))
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut results: TopicSubscription,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(command) = commands.recv() => self.handle(command).await,
                Some(payload) = results.recv() => self.on_result(payload),
                else => break,
            }
        }

        let dropped = self.registry.clear();
        info!(dropped, "Landlord reactor stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Admit {
                request,
                body,
                sink,
            } => self.on_admit(request, body, sink).await,
            Command::Timeout { id, seq } => self.on_timeout(&id, seq),
            Command::PendingCount { reply } => {
                let _ = reply.send(self.registry.len());
            }
        }
    }

    async fn on_admit(
        &mut self,
        request: WorkRequest,
        body: Vec<u8>,
        sink: oneshot::Sender<JobOutcome>,
    ) {
        let target = routing_target(&request.method, &request.params);
        let key = routing_key(&request.method, &request.params, &mut OsRng);
        let partition = key.partition().unwrap_or_else(|_| OsRng.gen());
        let queue = queue_name(partition);

        let job = PendingJob::new(request.id.clone(), request.method.clone(), target, sink);
        let seq = match self.registry.insert(job) {
            Ok(seq) => seq,
            Err((err, job)) => {
                warn!(id = %request.id, "Rejected job with duplicate id");
                LANDLORD_JOBS_REJECTED
                    .with_label_values(&[err.reason()])
                    .inc();
                job.resolve(JobOutcome::Rejected(err));
                return;
            }
        };

        if let Err(e) = self.bus.push(&queue, body).await {
            warn!(id = %request.id, queue = %queue, error = %e, "Unable to queue job");
            if let Some(job) = self.registry.take(&request.id) {
                self.finish(job, JobOutcome::Unavailable(e.to_string()));
            }
            return;
        }

        let timers = self.timers.clone();
        let timeout = self.request_timeout;
        let id = request.id.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = timers.send(Command::Timeout { id, seq }).await;
        });
        self.registry.arm(&request.id, timer.abort_handle());

        LANDLORD_JOBS_ADMITTED.inc();
        debug!(
            id = %request.id,
            method = %request.method,
            queue = %queue,
            routing_key = ?key,
            "Job admitted"
        );
    }

    fn on_timeout(&mut self, id: &str, seq: u64) {
        let Some(job) = self.registry.take_expired(id, seq) else {
            return;
        };

        warn!(
            id = %job.id,
            method = %job.method,
            data_hash = job.target.data_hash.as_deref().unwrap_or("unknown"),
            node_id = job.target.node_id.as_deref().unwrap_or("unknown"),
            "Job timed out"
        );

        if let Some(node_id) = job.target.node_id.clone() {
            self.sample(ReliabilitySample::Timeout { node_id });
        }

        self.finish(job, JobOutcome::TimedOut);
    }

    fn on_result(&mut self, payload: Vec<u8>) {
        let result = match WorkResult::from_slice(&payload) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Discarding malformed result");
                return;
            }
        };

        let Some(job) = self.registry.take(&result.id) else {
            LANDLORD_LATE_RESULTS.inc();
            info!(id = %result.id, "Job completed late");
            return;
        };

        let outcome = match result.error {
            Some(error) => JobOutcome::Failed(error.message),
            None => {
                if let Some(node_id) = job.target.node_id.clone() {
                    self.sample(ReliabilitySample::Success {
                        node_id,
                        elapsed: job.elapsed(),
                    });
                }
                JobOutcome::Completed(payload)
            }
        };

        self.finish(job, outcome);
    }

    fn sample(&self, sample: ReliabilitySample) {
        if self.reliability.send(sample).is_err() {
            warn!("Reliability recorder is gone; dropping sample");
        }
    }

    fn finish(&mut self, job: PendingJob, outcome: JobOutcome) {
        let id = job.id.clone();
        let label = outcome.label();
        let elapsed_ms = job.elapsed().as_millis() as u64;
        LANDLORD_JOBS_COMPLETED.with_label_values(&[label]).inc();
        if !job.resolve(outcome) {
            debug!(id = %id, "Caller went away before the job resolved");
        }
        debug!(id = %id, outcome = label, elapsed_ms, "Job resolved");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AdmissionError;
    use serde_json::json;
    use shared_bus::InMemoryMessageBus;
    use shared_types::{Contact, InMemoryContactStore, NodeId, RpcError};
    use tokio::time::timeout;

    const NODE: &str = "5a00000000000000000000000000000000000001";
    const TOPIC: &str = "work.close";

    struct Fixture {
        bus: Arc<InMemoryMessageBus>,
        contacts: Arc<InMemoryContactStore>,
        handle: ReactorHandle,
        task: ReactorTask,
    }

    async fn fixture(request_timeout: Duration) -> Fixture {
        let bus = Arc::new(InMemoryMessageBus::new());
        let node_id: NodeId = NODE.parse().unwrap();
        let contacts = Arc::new(InMemoryContactStore::with_contacts([Contact::new(
            node_id, "10.0.0.1", 4000,
        )]));
        let recorder = ReliabilityRecorder::new(contacts.clone(), request_timeout, 0.001);
        let (handle, task) = Reactor::spawn(bus.clone(), recorder, request_timeout, TOPIC)
            .await
            .unwrap();
        Fixture {
            bus,
            contacts,
            handle,
            task,
        }
    }

    fn proof_request(id: &str) -> WorkRequest {
        WorkRequest::new(
            id,
            "getStorageProof",
            vec![json!({"nodeID": NODE, "address": "10.0.0.1", "port": 4000}), json!({"hash": "ab"})],
        )
    }

    fn submit(
        handle: &ReactorHandle,
        request: WorkRequest,
    ) -> JoinHandle<Result<JobOutcome, LandlordError>> {
        let handle = handle.clone();
        let body = request.to_bytes();
        tokio::spawn(async move { handle.submit(request, body).await })
    }

    async fn take_queued(bus: &InMemoryMessageBus, queue: &str) -> WorkRequest {
        let mut consumer = bus.consume(queue).await.unwrap();
        let delivery = timeout(Duration::from_secs(2), consumer.next())
            .await
            .unwrap()
            .unwrap();
        WorkRequest::from_slice(&delivery.ack()).unwrap()
    }

    async fn wait_for<F: Fn() -> bool>(check: F) {
        timeout(Duration::from_secs(2), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_result_resolves_job_verbatim() {
        let fx = fixture(Duration::from_secs(30)).await;
        let pending = submit(&fx.handle, proof_request("job-1"));

        let queued = take_queued(&fx.bus, "work-x-5a").await;
        assert_eq!(queued.id, "job-1");

        let result = WorkResult::success("job-1", json!([null, {"proof": []}])).to_bytes();
        fx.bus.publish(TOPIC, result.clone()).await.unwrap();

        let outcome = timeout(Duration::from_secs(2), pending)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(outcome, JobOutcome::Completed(result));
        assert_eq!(fx.handle.pending_count().await.unwrap(), 0);

        let node_id: NodeId = NODE.parse().unwrap();
        let contacts = fx.contacts.clone();
        wait_for(move || {
            contacts
                .get(&node_id)
                .and_then(|c| c.response_time)
                .is_some()
        })
        .await;
        fx.task.shutdown().await;
    }

    #[tokio::test]
    async fn test_error_result_forwards_message() {
        let fx = fixture(Duration::from_secs(30)).await;
        let pending = submit(&fx.handle, WorkRequest::new("e1", "ping", vec![]));

        // ping routes at random; wait until it is pending
        timeout(Duration::from_secs(2), async {
            while fx.handle.pending_count().await.unwrap() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let failure = WorkResult::failure("e1", RpcError::internal("farmer unreachable"));
        fx.bus.publish(TOPIC, failure.to_bytes()).await.unwrap();

        let outcome = timeout(Duration::from_secs(2), pending)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(outcome, JobOutcome::Failed("farmer unreachable".into()));
        fx.task.shutdown().await;
    }

    #[tokio::test]
    async fn test_timeout_resolves_and_records_failure() {
        let fx = fixture(Duration::from_millis(50)).await;
        let pending = submit(&fx.handle, proof_request("slow"));

        let outcome = timeout(Duration::from_secs(2), pending)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(outcome, JobOutcome::TimedOut);

        let node_id: NodeId = NODE.parse().unwrap();
        let contacts = fx.contacts.clone();
        wait_for(move || {
            contacts
                .get(&node_id)
                .map(|c| c.timeout_rate() > 0.0)
                .unwrap_or(false)
        })
        .await;

        // A result after the timeout is a no-op
        let late = WorkResult::success("slow", json!([null])).to_bytes();
        fx.bus.publish(TOPIC, late).await.unwrap();
        assert_eq!(fx.handle.pending_count().await.unwrap(), 0);
        fx.task.shutdown().await;
    }

    #[tokio::test]
    async fn test_second_result_is_ignored() {
        let fx = fixture(Duration::from_secs(30)).await;
        let pending = submit(&fx.handle, proof_request("twice"));
        take_queued(&fx.bus, "work-x-5a").await;

        let first = WorkResult::success("twice", json!([null, 1])).to_bytes();
        let second = WorkResult::success("twice", json!([null, 2])).to_bytes();
        fx.bus.publish(TOPIC, first.clone()).await.unwrap();
        fx.bus.publish(TOPIC, second).await.unwrap();

        let outcome = timeout(Duration::from_secs(2), pending)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(outcome, JobOutcome::Completed(first));
        assert_eq!(fx.handle.pending_count().await.unwrap(), 0);
        fx.task.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_pending_id_rejected() {
        let fx = fixture(Duration::from_secs(30)).await;
        let _first = submit(&fx.handle, proof_request("same"));
        take_queued(&fx.bus, "work-x-5a").await;

        let outcome = fx
            .handle
            .submit(proof_request("same"), Vec::new())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            JobOutcome::Rejected(AdmissionError::DuplicateId("same".into()))
        );
        assert_eq!(fx.handle.pending_count().await.unwrap(), 1);
        fx.task.shutdown().await;
    }

    #[tokio::test]
    async fn test_offer_routes_by_data_hash() {
        let fx = fixture(Duration::from_secs(30)).await;
        let request = WorkRequest::new("offer", "getStorageOffer", vec![json!({"data_hash": "c3ff"})]);
        let _pending = submit(&fx.handle, request);

        let queued = take_queued(&fx.bus, "work-x-c3").await;
        assert_eq!(queued.method, "getStorageOffer");
        fx.task.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_releases_callers() {
        let fx = fixture(Duration::from_secs(30)).await;
        let pending = submit(&fx.handle, proof_request("orphan"));
        take_queued(&fx.bus, "work-x-5a").await;

        fx.task.shutdown().await;
        let result = timeout(Duration::from_secs(2), pending).await.unwrap().unwrap();
        assert!(matches!(result, Err(LandlordError::ShuttingDown)));
        assert!(fx.handle.pending_count().await.is_err());
    }
}

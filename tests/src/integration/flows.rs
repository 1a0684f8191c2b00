//! # Landlord Reactor ↔ Renter Flows
//!
//! The landlord's reactor and a running renter sharing one bus, driven
//! directly through [`cx_02_landlord::ReactorHandle`]:
//!
//! 1. **Routing agreement**: a job routed by the landlord lands on a queue
//!    the renter covering that partition consumes
//! 2. **Result correlation**: the renter's completion resolves the job with
//!    the same id
//! 3. **Contact bookkeeping**: a timed-out job updates the target farmer

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use cx_01_sharding::queue_name;
    use cx_02_landlord::{JobOutcome, Reactor, ReactorHandle, ReactorTask, ReliabilityRecorder};
    use serde_json::{json, Value};
    use shared_bus::{InMemoryMessageBus, MessageBus, DEFAULT_RESULT_TOPIC};
    use shared_types::{
        codes, Contact, ContactStore, InMemoryContactStore, NodeId, WorkRequest, WorkResult,
    };
    use std::sync::Arc;
    use std::time::Duration;

    async fn reactor(
        bus: &Arc<InMemoryMessageBus>,
        contacts: Arc<InMemoryContactStore>,
        timeout: Duration,
    ) -> (ReactorHandle, ReactorTask) {
        let recorder = ReliabilityRecorder::new(contacts as Arc<dyn ContactStore>, timeout, 0.04);
        Reactor::spawn(bus.clone(), recorder, timeout, DEFAULT_RESULT_TOPIC)
            .await
            .unwrap()
    }

    fn retrieval(id: &str, farmer: &NodeId) -> WorkRequest {
        WorkRequest::new(
            id,
            "getRetrievalPointer",
            vec![
                contact_json(farmer),
                json!({"data_hash": "ab".repeat(20), "farmer_id": farmer.to_hex()}),
            ],
        )
    }

    fn completed(outcome: JobOutcome) -> WorkResult {
        match outcome {
            JobOutcome::Completed(bytes) => WorkResult::from_slice(&bytes).unwrap(),
            other => panic!("expected a completed job, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_target_node_job_reaches_covering_renter() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let mut harness = start_renter(bus.clone(), renter_config(64)).await;
        let (handle, task) = reactor(
            &bus,
            Arc::new(InMemoryContactStore::new()),
            Duration::from_secs(5),
        )
        .await;

        let farmer = node_in(harness.range.start);
        let request = retrieval("flow-1", &farmer);
        let outcome = handle
            .submit(request.clone(), request.to_bytes())
            .await
            .unwrap();

        let result = completed(outcome);
        assert_eq!(result.id, "flow-1");
        let args = result.result.unwrap();
        assert_eq!(args[0], Value::Null);
        assert_eq!(args[1]["operation"], "PULL");
        assert_eq!(args[1]["farmer"]["nodeID"], farmer.to_hex());
        assert_eq!(harness.network.calls(), vec!["getRetrievalPointer"]);

        task.shutdown().await;
        harness.renter.shutdown().await;
    }

    #[tokio::test]
    async fn test_disallowed_method_never_reaches_network() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let mut harness = start_renter(bus.clone(), renter_config(64)).await;
        let mut results = bus.subscribe(DEFAULT_RESULT_TOPIC).await.unwrap();

        let request = WorkRequest::new("flow-2", "deleteEverything", vec![json!({})]);
        bus.push(&queue_name(harness.range.end), request.to_bytes())
            .await
            .unwrap();

        let bytes = tokio::time::timeout(Duration::from_secs(5), results.recv())
            .await
            .unwrap()
            .unwrap();
        let result = WorkResult::from_slice(&bytes).unwrap();
        assert_eq!(result.id, "flow-2");
        assert_eq!(result.error.unwrap().code, codes::METHOD_NOT_FOUND);
        assert!(harness.network.calls().is_empty());

        harness.renter.shutdown().await;
    }

    #[tokio::test]
    async fn test_dispatch_error_forwarded_as_failure() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let mut harness = start_renter(bus.clone(), renter_config(64)).await;
        let (handle, task) = reactor(
            &bus,
            Arc::new(InMemoryContactStore::new()),
            Duration::from_secs(5),
        )
        .await;

        let farmer = node_in(harness.range.start);
        let request = WorkRequest::new("flow-3", "getStorageProof", vec![contact_json(&farmer)]);
        let outcome = handle
            .submit(request.clone(), request.to_bytes())
            .await
            .unwrap();

        match outcome {
            JobOutcome::Failed(message) => assert!(message.contains("getStorageProof")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(harness.network.calls().is_empty());

        task.shutdown().await;
        harness.renter.shutdown().await;
    }

    #[tokio::test]
    async fn test_timeout_updates_farmer_contact() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let mut harness = start_renter(bus.clone(), renter_config(256)).await;

        let farmer = node_in(outside(&harness.range));
        let contacts = Arc::new(InMemoryContactStore::with_contacts([Contact::new(
            farmer, "10.1.0.1", 4000,
        )]));
        let (handle, task) = reactor(&bus, contacts.clone(), Duration::from_millis(100)).await;

        let request = retrieval("flow-4", &farmer);
        let outcome = handle
            .submit(request.clone(), request.to_bytes())
            .await
            .unwrap();
        assert!(matches!(outcome, JobOutcome::TimedOut));

        let updated = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(contact) = contacts.get(&farmer) {
                    if contact.last_timeout.is_some() {
                        return contact;
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert!(updated.timeout_rate() > 0.0);
        assert!(updated.response_time.is_some());
        assert!(harness.network.calls().is_empty());

        task.shutdown().await;
        harness.renter.shutdown().await;
    }
}

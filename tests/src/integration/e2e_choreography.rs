//! # End-to-End Choreography
//!
//! A caller speaks HTTP to the landlord; a renter on the same bus executes
//! the job against the mock storage network:
//!
//! ```text
//! reqwest ──POST /──▶ landlord ──work-x-NN──▶ renter ──▶ MockNetwork
//!    ▲                   │                       │
//!    └──── HTTP body ────┘◀──────work.close──────┘
//! ```

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use cx_03_renter::ports::RenewBehaviour;
    use serde_json::{json, Value};
    use shared_bus::InMemoryMessageBus;
    use shared_types::{
        Contact, Contract, InMemoryContactStore, NodeId, Offer, SignerRole, StorageItem,
    };
    use std::sync::Arc;
    use std::time::Duration;

    fn shard_hash(partition: u8) -> String {
        format!("{partition:02x}{}", "cd".repeat(19))
    }

    #[tokio::test]
    async fn test_consignment_pointer_round_trip() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let mut harness = start_renter(bus.clone(), renter_config(16)).await;
        let (mut landlord, url) = start_landlord(
            bus.clone(),
            Arc::new(InMemoryContactStore::new()),
            Duration::from_secs(5),
        )
        .await;

        let farmer = node_in(harness.range.start);
        let response = rpc(
            &url,
            json!({
                "id": "e2e-1",
                "method": "getConsignmentPointer",
                "params": [
                    contact_json(&farmer),
                    {"data_hash": shard_hash(0x01), "farmer_id": farmer.to_hex()},
                    {"challenges": ["c0"], "tree": ["t0"]}
                ]
            }),
        )
        .await;

        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["id"], "e2e-1");
        assert_eq!(body["result"][0], Value::Null);
        assert_eq!(body["result"][1]["operation"], "PUSH");
        assert_eq!(body["result"][1]["hash"], shard_hash(0x01));

        landlord.shutdown().await;
        harness.renter.shutdown().await;
    }

    #[tokio::test]
    async fn test_storage_offer_places_primary_and_mirrors() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let mut harness = start_renter(bus.clone(), renter_config(16)).await;
        let (mut landlord, url) = start_landlord(
            bus.clone(),
            Arc::new(InMemoryContactStore::new()),
            Duration::from_secs(5),
        )
        .await;

        let hash = shard_hash(harness.range.start);
        let offers: Vec<Offer> = (1..=3u8)
            .map(|n| {
                let node_id = NodeId([n; 20]);
                Offer {
                    contact: Contact::new(node_id, format!("10.2.0.{n}"), 4000),
                    contract: Contract::from_object(
                        &json!({"data_hash": hash, "farmer_id": node_id.to_hex()}),
                    )
                    .unwrap(),
                }
            })
            .collect();
        harness
            .network
            .set_offers(offers.iter().cloned().map(Ok));

        let response = rpc(
            &url,
            json!({
                "id": "e2e-2",
                "method": "getStorageOffer",
                "params": [{"data_hash": hash, "data_size": 1024}, [NodeId([9; 20]).to_hex()]]
            }),
        )
        .await;

        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["result"][1], offers[0].contact.to_value());
        assert_eq!(body["result"][2], offers[0].contract.to_object());

        let item = harness.storage.get(&hash).unwrap();
        assert!(item.get_contract(&NodeId([1; 20])).is_some());

        tokio::time::timeout(Duration::from_secs(5), async {
            while harness.mirrors.records().len() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let requests = harness.network.offer_requests();
        assert_eq!(requests[0].blacklist, vec![NodeId([9; 20]).to_hex()]);
        assert!(requests[0].contract.has_hd_key());

        landlord.shutdown().await;
        harness.renter.shutdown().await;
    }

    #[tokio::test]
    async fn test_retrieval_renews_legacy_contract() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let config = cx_03_renter::RenterConfig {
            migration_private_key: Some("33".repeat(32)),
            ..renter_config(16)
        };
        let mut harness = start_renter(bus.clone(), config).await;
        let (mut landlord, url) = start_landlord(
            bus.clone(),
            Arc::new(InMemoryContactStore::new()),
            Duration::from_secs(5),
        )
        .await;

        // The contact routes the job; the contract names the signing farmer.
        let farmer_id = farmer_key().node_id();
        let legacy = json!({
            "data_hash": shard_hash(0x02),
            "renter_id": migration_key().node_id().to_hex(),
            "farmer_id": farmer_id.to_hex(),
        });
        let mut item = StorageItem::new(shard_hash(0x02));
        item.contracts
            .insert(farmer_id, Contract::from_object(&legacy).unwrap());
        harness.storage.insert(item);
        harness
            .network
            .set_renew_behaviour(RenewBehaviour::Countersign(farmer_key()));

        let response = rpc(
            &url,
            json!({
                "id": "e2e-3",
                "method": "getRetrievalPointer",
                "params": [contact_json(&node_in(harness.range.start)), legacy]
            }),
        )
        .await;
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["result"][1]["operation"], "PULL");

        let stored = harness
            .storage
            .get(&shard_hash(0x02))
            .unwrap()
            .get_contract(&farmer_id)
            .cloned()
            .unwrap();
        assert!(stored.has_hd_key());
        assert!(stored.verify(SignerRole::Farmer, &farmer_id).is_ok());
        assert_eq!(harness.network.renew_requests().len(), 1);
        assert!(harness.network.retrieval_contracts()[0].has_hd_key());

        landlord.shutdown().await;
        harness.renter.shutdown().await;
    }

    #[tokio::test]
    async fn test_renter_error_becomes_500() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let mut harness = start_renter(bus.clone(), renter_config(16)).await;
        harness.network.fail_calls(Some(cx_03_renter::NetworkError::Remote(
            "Farmer refused the consignment".into(),
        )));
        let (mut landlord, url) = start_landlord(
            bus.clone(),
            Arc::new(InMemoryContactStore::new()),
            Duration::from_secs(5),
        )
        .await;

        let farmer = node_in(harness.range.end);
        let response = rpc(
            &url,
            json!({
                "id": "e2e-4",
                "method": "getConsignmentPointer",
                "params": [
                    contact_json(&farmer),
                    {"data_hash": shard_hash(0x03)},
                    {"challenges": [], "tree": []}
                ]
            }),
        )
        .await;

        assert_eq!(response.status(), 500);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["message"], "Farmer refused the consignment");

        landlord.shutdown().await;
        harness.renter.shutdown().await;
    }

    #[tokio::test]
    async fn test_uncovered_partition_times_out() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let mut harness = start_renter(bus.clone(), renter_config(256)).await;
        let farmer = node_in(outside(&harness.range));
        let contacts = Arc::new(InMemoryContactStore::with_contacts([Contact::new(
            farmer, "10.1.0.1", 4000,
        )]));
        let (mut landlord, url) =
            start_landlord(bus.clone(), contacts.clone(), Duration::from_millis(150)).await;

        let response = rpc(
            &url,
            json!({
                "id": "e2e-5",
                "method": "getStorageProof",
                "params": [contact_json(&farmer), {"hash": shard_hash(0x04)}]
            }),
        )
        .await;

        assert_eq!(response.status(), 408);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["message"], "Request timed out");

        tokio::time::timeout(Duration::from_secs(5), async {
            while contacts
                .get(&farmer)
                .and_then(|c| c.last_timeout)
                .is_none()
            {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        landlord.shutdown().await;
        harness.renter.shutdown().await;
    }

    #[tokio::test]
    async fn test_bad_credentials_never_queue_work() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let (mut landlord, url) = start_landlord(
            bus.clone(),
            Arc::new(InMemoryContactStore::new()),
            Duration::from_secs(5),
        )
        .await;

        let response = reqwest::Client::new()
            .post(&url)
            .basic_auth(USERNAME, Some("guess"))
            .json(&json!({"id": "e2e-6", "method": "ping", "params": []}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 401);
        assert_eq!(bus.messages_pushed(), 0);
        landlord.shutdown().await;
    }
}

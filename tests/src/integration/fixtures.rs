//! Shared wiring for the integration tests.

use cx_01_sharding::PartitionRange;
use cx_02_landlord::{AuthConfig, HttpConfig, LandlordConfig, LandlordService};
use cx_03_renter::{MockNetwork, RenterConfig, RenterIdentity, RenterPorts, RenterService};
use serde_json::{json, Value};
use shared_bus::InMemoryMessageBus;
use shared_types::{
    Contact, InMemoryContactStore, InMemoryMirrorStore, InMemoryStorageManager, KeyPair, NodeId,
};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

pub const USERNAME: &str = "landlord";
pub const PASSWORD: &str = "s3cret";

pub fn extended_key_hex() -> String {
    format!("{}{}", "11".repeat(32), "22".repeat(32))
}

pub fn migration_key() -> KeyPair {
    KeyPair::from_hex(&"33".repeat(32)).unwrap()
}

pub fn farmer_key() -> KeyPair {
    KeyPair::from_hex(&"44".repeat(32)).unwrap()
}

/// A node id whose routing partition is `partition`.
pub fn node_in(partition: u8) -> NodeId {
    let mut id = [0x5a; 20];
    id[0] = partition;
    NodeId(id)
}

pub fn contact_json(node_id: &NodeId) -> Value {
    json!({"address": "10.1.0.1", "port": 4000, "nodeID": node_id.to_hex()})
}

/// A partition no renter with `range` listens on.
pub fn outside(range: &PartitionRange) -> u8 {
    if range.end < u8::MAX {
        range.end + 1
    } else {
        range.start - 1
    }
}

pub struct RenterHarness {
    pub renter: RenterService,
    pub range: PartitionRange,
    pub network: Arc<MockNetwork>,
    pub storage: Arc<InMemoryStorageManager>,
    pub mirrors: Arc<InMemoryMirrorStore>,
}

pub async fn start_renter(bus: Arc<InMemoryMessageBus>, config: RenterConfig) -> RenterHarness {
    let identity = RenterIdentity::from_config(&config).unwrap();
    let network = Arc::new(MockNetwork::new(Contact::new(
        identity.node_id(),
        "127.0.0.1",
        4100,
    )));
    let storage = Arc::new(InMemoryStorageManager::new());
    let mirrors = Arc::new(InMemoryMirrorStore::new());
    let ports = RenterPorts {
        bus,
        network: network.clone(),
        contacts: Arc::new(InMemoryContactStore::new()),
        storage: storage.clone(),
        mirrors: mirrors.clone(),
    };

    let mut renter = RenterService::new(config, ports).unwrap();
    let range = renter.start().await.unwrap();
    RenterHarness {
        renter,
        range,
        network,
        storage,
        mirrors,
    }
}

/// A renter config whose identity sits in the middle of the keyspace, so
/// any pool of 16 or more renters gets a range that fits.
pub fn renter_config(total_renters: u32) -> RenterConfig {
    let mut config = RenterConfig {
        network_private_extended_key: extended_key_hex(),
        total_renters,
        ..Default::default()
    };
    config.network_index = (0..256)
        .find(|&index| {
            let candidate = RenterConfig {
                network_index: index,
                ..config.clone()
            };
            let center = RenterIdentity::from_config(&candidate)
                .unwrap()
                .node_id()
                .first_byte();
            (0x40..=0xbf).contains(&center)
        })
        .expect("no mid-keyspace child key in the first 256 indexes");
    config
}

pub fn landlord_config(request_timeout: Duration) -> LandlordConfig {
    LandlordConfig {
        http: HttpConfig {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
        },
        auth: AuthConfig {
            username: USERNAME.into(),
            password: PASSWORD.into(),
        },
        request_timeout,
        ..Default::default()
    }
}

/// Start a landlord and return it with its base URL.
pub async fn start_landlord(
    bus: Arc<InMemoryMessageBus>,
    contacts: Arc<InMemoryContactStore>,
    request_timeout: Duration,
) -> (LandlordService, String) {
    let mut landlord =
        LandlordService::new(landlord_config(request_timeout), bus, contacts).unwrap();
    let addr = landlord.start().await.unwrap();
    (landlord, format!("http://{addr}"))
}

/// POST an RPC envelope with valid credentials.
pub async fn rpc(url: &str, body: Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(url)
        .basic_auth(USERNAME, Some(PASSWORD))
        .json(&body)
        .send()
        .await
        .unwrap()
}

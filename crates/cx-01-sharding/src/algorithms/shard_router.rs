//! # Shard Router
//!
//! Chooses the work queue for an RPC request.
//!
//! | Method | Key |
//! |--------|-----|
//! | `getConsignmentPointer`, `getRetrievalPointer`, `getStorageProof` | `params[0].nodeID` |
//! | `getStorageOffer` | `params[0].data_hash` |
//! | anything else | one random byte |
//!
//! Requests to a known farmer land on that farmer's partition; offers are
//! spread by content; the rest are load-balanced at random.

use crate::domain::{RoutingKey, QUEUE_PREFIX};
use rand::Rng;
use serde_json::Value;
use shared_types::{RoutingSource, RpcMethod};
use tracing::warn;

/// Farmer and shard a request concerns, as far as its params reveal them.
///
/// Used for timeout logs and reliability bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTarget {
    pub node_id: Option<String>,
    pub data_hash: Option<String>,
}

fn str_field(params: &[Value], index: usize, field: &str) -> Option<String> {
    params
        .get(index)
        .and_then(|p| p.get(field))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Extract the target farmer and shard hash of a request.
///
/// Farmer methods carry the contact first and the contract second; offers
/// carry the contract first.
pub fn routing_target(method: &str, params: &[Value]) -> RoutingTarget {
    match RpcMethod::routing_source(method) {
        RoutingSource::TargetNode => RoutingTarget {
            node_id: str_field(params, 0, "nodeID"),
            data_hash: str_field(params, 1, "data_hash"),
        },
        RoutingSource::DataHash => RoutingTarget {
            node_id: None,
            data_hash: str_field(params, 0, "data_hash"),
        },
        RoutingSource::Random => RoutingTarget::default(),
    }
}

/// Derive the routing key of a request.
///
/// The returned key always has a valid partition: a missing or non-hex
/// natural key falls back to a random byte.
pub fn routing_key<R: Rng>(method: &str, params: &[Value], rng: &mut R) -> RoutingKey {
    let key = match RpcMethod::routing_source(method) {
        RoutingSource::TargetNode => str_field(params, 0, "nodeID").map(RoutingKey::TargetNode),
        RoutingSource::DataHash => str_field(params, 0, "data_hash").map(RoutingKey::DataHash),
        RoutingSource::Random => Some(RoutingKey::Random(rng.gen())),
    };

    match key {
        Some(key) if key.partition().is_ok() => key,
        other => {
            warn!(method, key = ?other, "No usable routing key, routing at random");
            RoutingKey::Random(rng.gen())
        }
    }
}

/// Queue name of a partition: `work-x-` and two lowercase hex digits.
pub fn queue_name(partition: u8) -> String {
    format!("{QUEUE_PREFIX}{partition:02x}")
}

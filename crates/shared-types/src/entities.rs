//! # Storage Network Entities
//!
//! ## Clusters
//!
//! - **Identity**: `NodeId`
//! - **Peers**: `Contact` with its reliability metrics
//! - **Placement**: `StorageItem`, `Offer`, `MirrorRecord`
//! - **Transfer**: `DataChannelPointer`, `AuditRecords`

use crate::contract::Contract;
use crate::errors::DecodeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// IDENTITY
// =============================================================================

/// 20-byte node identifier, carried on the wire as 40 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(pub [u8; 20]);

impl NodeId {
    /// Leading byte: the node's queue partition.
    pub fn first_byte(&self) -> u8 {
        self.0[0]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for NodeId {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| DecodeError::InvalidNodeId(s.to_string()))?;
        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|_| DecodeError::InvalidNodeId(s.to_string()))?;
        Ok(Self(arr))
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// PEERS
// =============================================================================

/// Response time assumed for a farmer that has never answered.
pub const DEFAULT_RESPONSE_TIME_MS: f64 = 10_000.0;

/// Smoothing factor of the response time moving average.
pub const RESPONSE_TIME_ALPHA: f64 = 2.0 / 1001.0;

/// Window over which timeout failures decay.
pub const TIMEOUT_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

/// Weight added to the timeout rate per failure.
pub const TIMEOUT_WEIGHT: f64 = 0.01;

/// A farmer as known to the landlord and renters.
///
/// The wire form is the plain `{address, port, nodeID}` record; the
/// reliability fields are optional so that form decodes too. Unknown keys are
/// kept in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(rename = "nodeID")]
    pub node_id: NodeId,
    pub address: String,
    pub port: u16,
    #[serde(rename = "lastSeen", default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<u64>,
    #[serde(rename = "responseTime", default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    #[serde(rename = "timeoutRate", default, skip_serializing_if = "Option::is_none")]
    pub timeout_rate: Option<f64>,
    #[serde(rename = "lastTimeout", default, skip_serializing_if = "Option::is_none")]
    pub last_timeout: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Contact {
    pub fn new(node_id: NodeId, address: impl Into<String>, port: u16) -> Self {
        Self {
            node_id,
            address: address.into(),
            port,
            last_seen: None,
            response_time: None,
            timeout_rate: None,
            last_timeout: None,
            extra: Map::new(),
        }
    }

    /// Reconstruct from a plain wire record.
    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        serde_json::from_value(value.clone()).map_err(|e| DecodeError::record("contact", e))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// `storj://address:port/nodeID`
    pub fn url(&self) -> String {
        format!("storj://{}:{}/{}", self.address, self.port, self.node_id)
    }

    /// Fold a response time sample into the moving average.
    pub fn record_response_time(&mut self, sample_ms: f64) {
        let previous = self.response_time.unwrap_or(DEFAULT_RESPONSE_TIME_MS);
        self.response_time = Some(RESPONSE_TIME_ALPHA * sample_ms + (1.0 - RESPONSE_TIME_ALPHA) * previous);
    }

    /// Count a timeout against this farmer at `now_ms`.
    ///
    /// The previous rate decays linearly to zero over [`TIMEOUT_WINDOW_MS`]
    /// since the last timeout, then [`TIMEOUT_WEIGHT`] is added. The result is
    /// capped at 1.
    pub fn record_timeout_failure(&mut self, now_ms: u64) {
        let previous = self.timeout_rate.unwrap_or(0.0);
        let elapsed = self
            .last_timeout
            .map(|last| now_ms.saturating_sub(last))
            .unwrap_or(TIMEOUT_WINDOW_MS);
        let decay = 1.0 - (elapsed.min(TIMEOUT_WINDOW_MS) as f64 / TIMEOUT_WINDOW_MS as f64);
        self.timeout_rate = Some((previous * decay + TIMEOUT_WEIGHT).min(1.0));
        self.last_timeout = Some(now_ms);
    }

    pub fn timeout_rate(&self) -> f64 {
        self.timeout_rate.unwrap_or(0.0)
    }
}

// =============================================================================
// TRANSFER
// =============================================================================

/// Where and how to push or pull one shard to or from a farmer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataChannelPointer {
    pub farmer: Contact,
    pub hash: String,
    pub token: String,
    pub operation: String,
}

impl DataChannelPointer {
    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        serde_json::from_value(value.clone()).map_err(|e| DecodeError::record("pointer", e))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Audit challenges and the merkle leaves they are checked against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecords {
    pub challenges: Vec<String>,
    pub tree: Vec<String>,
}

impl AuditRecords {
    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        serde_json::from_value(value.clone()).map_err(|e| DecodeError::record("audit", e))
    }
}

// =============================================================================
// PLACEMENT
// =============================================================================

/// Everything known about one shard: its contracts per farmer and audit data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StorageItem {
    pub hash: String,
    #[serde(default)]
    pub contracts: BTreeMap<NodeId, Contract>,
    #[serde(default)]
    pub trees: BTreeMap<NodeId, Vec<String>>,
    #[serde(default)]
    pub challenges: BTreeMap<NodeId, Vec<String>>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl StorageItem {
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            ..Default::default()
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        serde_json::from_value(value.clone()).map_err(|e| DecodeError::record("storage item", e))
    }

    pub fn add_contract(&mut self, contact: &Contact, contract: Contract) {
        self.contracts.insert(contact.node_id, contract);
    }

    pub fn remove_contract(&mut self, node_id: &NodeId) -> Option<Contract> {
        self.contracts.remove(node_id)
    }

    pub fn get_contract(&self, node_id: &NodeId) -> Option<&Contract> {
        self.contracts.get(node_id)
    }
}

/// One farmer's answer to a storage offer request.
#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    pub contact: Contact,
    pub contract: Contract,
}

/// A non-primary offer kept for later mirroring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorRecord {
    pub contact: Contact,
    pub contract: Contract,
    #[serde(rename = "isEstablished")]
    pub is_established: bool,
    pub created: u64,
}

impl MirrorRecord {
    pub fn queued(offer: &Offer, now_ms: u64) -> Self {
        Self {
            contact: offer.contact.clone(),
            contract: offer.contract.clone(),
            is_established: false,
            created: now_ms,
        }
    }
}

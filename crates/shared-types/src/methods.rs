//! # RPC Method Registry
//!
//! The closed set of storage-network methods a renter will execute. Anything
//! outside this enumeration is rejected at the boundary with
//! [`codes::METHOD_NOT_FOUND`](crate::envelope::codes::METHOD_NOT_FOUND).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RpcMethod {
    #[serde(rename = "getConsignmentPointer")]
    GetConsignmentPointer,
    #[serde(rename = "getRetrievalPointer")]
    GetRetrievalPointer,
    #[serde(rename = "getMirrorNodes")]
    GetMirrorNodes,
    #[serde(rename = "getStorageOffer")]
    GetStorageOffer,
    #[serde(rename = "getStorageProof")]
    GetStorageProof,
    #[serde(rename = "ping")]
    Ping,
}

/// How the landlord chooses a partition for a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingSource {
    /// `params[0].nodeID`: the target farmer's partition.
    TargetNode,
    /// `params[0].data_hash`: route by content, no farmer chosen yet.
    DataHash,
    /// One random byte.
    Random,
}

impl RpcMethod {
    pub const ALL: [RpcMethod; 6] = [
        RpcMethod::GetConsignmentPointer,
        RpcMethod::GetRetrievalPointer,
        RpcMethod::GetMirrorNodes,
        RpcMethod::GetStorageOffer,
        RpcMethod::GetStorageProof,
        RpcMethod::Ping,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetConsignmentPointer => "getConsignmentPointer",
            Self::GetRetrievalPointer => "getRetrievalPointer",
            Self::GetMirrorNodes => "getMirrorNodes",
            Self::GetStorageOffer => "getStorageOffer",
            Self::GetStorageProof => "getStorageProof",
            Self::Ping => "ping",
        }
    }

    /// Routing source for a method name. Unknown names route randomly.
    pub fn routing_source(method: &str) -> RoutingSource {
        match method.parse::<RpcMethod>() {
            Ok(Self::GetConsignmentPointer | Self::GetRetrievalPointer | Self::GetStorageProof) => {
                RoutingSource::TargetNode
            }
            Ok(Self::GetStorageOffer) => RoutingSource::DataHash,
            _ => RoutingSource::Random,
        }
    }
}

impl fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a method name is outside the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMethod(pub String);

impl FromStr for RpcMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for method in RpcMethod::ALL {
            assert_eq!(method.as_str().parse::<RpcMethod>(), Ok(method));
        }
    }

    #[test]
    fn test_unknown_method_rejected() {
        assert!("getBalance".parse::<RpcMethod>().is_err());
        assert!("Ping".parse::<RpcMethod>().is_err());
        assert!("".parse::<RpcMethod>().is_err());
    }

    #[test]
    fn test_routing_sources() {
        assert_eq!(
            RpcMethod::routing_source("getStorageProof"),
            RoutingSource::TargetNode
        );
        assert_eq!(
            RpcMethod::routing_source("getConsignmentPointer"),
            RoutingSource::TargetNode
        );
        assert_eq!(
            RpcMethod::routing_source("getRetrievalPointer"),
            RoutingSource::TargetNode
        );
        assert_eq!(
            RpcMethod::routing_source("getStorageOffer"),
            RoutingSource::DataHash
        );
        assert_eq!(RpcMethod::routing_source("ping"), RoutingSource::Random);
        assert_eq!(RpcMethod::routing_source("whatever"), RoutingSource::Random);
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&RpcMethod::GetMirrorNodes).unwrap();
        assert_eq!(json, "\"getMirrorNodes\"");
    }
}

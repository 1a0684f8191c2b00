//! Renter error types.
//!
//! Everything that goes wrong while serving a message ends up as a
//! [`DispatchError`] and is published as a `-32603` result. Only
//! [`RenterError`] reaches the operator, and only from `start`.

use crate::domain::config::ConfigError;
use cx_01_sharding::ShardError;
use shared_bus::BusError;
use shared_types::{codes, ContractError, DecodeError, KeyError, RpcError, StoreError};
use thiserror::Error;

/// Failure reported by the storage network.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkError {
    /// Could not reach the peer.
    #[error("{0}")]
    Transport(String),

    /// The peer or the protocol layer refused the call.
    #[error("{0}")]
    Remote(String),
}

/// Failure of the contract renewal exchange.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenewalError {
    /// The RENEW message could not be delivered.
    #[error("Renewal transport failed: {0}")]
    Transport(NetworkError),

    /// The farmer answered with an error.
    #[error("Farmer refused renewal: {0}")]
    PeerError(String),

    /// The returned contract changed more than the farmer signature.
    #[error("Invalid farmer contract: changed fields {0:?}")]
    InvalidDiff(Vec<String>),

    /// The farmer signature does not verify against `farmer_id`.
    #[error("Invalid farmer contract: {0}")]
    BadSignature(ContractError),

    /// Stamping or signing the updated contract failed.
    #[error("Unable to sign renewed contract: {0}")]
    Signing(ContractError),

    /// Storing the countersigned contract failed.
    #[error("Unable to save renewed contract: {0}")]
    Persistence(StoreError),
}

/// Failure while serving one work message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Params did not decode into the method's argument types.
    #[error("Invalid params for {method}: {reason}")]
    InvalidParams { method: &'static str, reason: String },

    /// Network interface call failed.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Contract renewal before retrieval failed.
    #[error(transparent)]
    Renewal(#[from] RenewalError),

    /// Contract stamping or signing failed.
    #[error("Unable to sign contract: {0}")]
    Signing(#[from] ContractError),

    /// Storage item could not be saved.
    #[error("Unable to save storage item: {0}")]
    Persistence(#[from] StoreError),
}

impl DispatchError {
    pub fn invalid_params(method: &'static str, reason: impl ToString) -> Self {
        Self::InvalidParams {
            method,
            reason: reason.to_string(),
        }
    }

    pub fn from_decode(method: &'static str, err: DecodeError) -> Self {
        Self::invalid_params(method, err)
    }

    /// Wire error object for the result topic.
    pub fn to_rpc_error(&self) -> RpcError {
        RpcError {
            code: codes::INTERNAL_ERROR,
            message: self.to_string(),
        }
    }
}

/// Startup and lifecycle errors.
#[derive(Debug, Error)]
pub enum RenterError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("key derivation failed: {0}")]
    Key(#[from] KeyError),

    #[error("subscription range: {0}")]
    Shard(#[from] ShardError),

    #[error("unable to load known seeds: {0}")]
    Store(#[from] StoreError),

    #[error("message bus error: {0}")]
    Bus(#[from] BusError),

    #[error("unable to join the network: {0}")]
    Network(#[from] NetworkError),

    #[error("renter is already {0}")]
    InvalidState(&'static str),
}

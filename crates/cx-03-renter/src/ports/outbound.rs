//! # Driven Ports (Outbound SPI)
//!
//! The storage network as the renter sees it. The host wires a concrete
//! peer-to-peer client behind [`NetworkInterface`]; the renter only calls it
//! and translates the outcome into work results.

use crate::domain::error::NetworkError;
use async_trait::async_trait;
use serde_json::{json, Value};
use shared_types::{
    AuditRecords, Contact, Contract, DataChannelPointer, Offer, RpcError, StorageItem,
};
use tokio::sync::broadcast;

/// Storage network client.
///
/// Implementations must be `Send + Sync`; every method may be called from
/// many dispatch tasks at once.
#[async_trait]
pub trait NetworkInterface: Send + Sync {
    /// This node's own contact, derived from the operating key.
    fn contact(&self) -> Contact;

    /// Connect to the network through the given `storj://` seed URLs.
    async fn join(&self, seeds: Vec<String>) -> Result<(), NetworkError>;

    /// Contacts added to the routing table from now on.
    fn subscribe_contacts(&self) -> broadcast::Receiver<Contact>;

    async fn get_consignment_pointer(
        &self,
        farmer: &Contact,
        contract: &Contract,
        audit: &AuditRecords,
    ) -> Result<DataChannelPointer, NetworkError>;

    async fn get_retrieval_pointer(
        &self,
        farmer: &Contact,
        contract: &Contract,
    ) -> Result<DataChannelPointer, NetworkError>;

    async fn get_mirror_nodes(
        &self,
        sources: &[DataChannelPointer],
        destinations: &[Contact],
    ) -> Result<Vec<Contact>, NetworkError>;

    async fn get_storage_proof(
        &self,
        farmer: &Contact,
        item: &StorageItem,
    ) -> Result<Value, NetworkError>;

    async fn ping(&self, contact: &Contact) -> Result<(), NetworkError>;

    /// Publish `contract` and stream back up to `max_offers` farmer offers,
    /// skipping farmers whose node id is in `blacklist`.
    async fn get_offer_stream(
        &self,
        contract: &Contract,
        max_offers: usize,
        blacklist: &[String],
    ) -> Result<Box<dyn OfferStream>, NetworkError>;

    /// Send a raw protocol message to `contact` and wait for its reply.
    async fn send(
        &self,
        contact: &Contact,
        message: RenewMessage,
    ) -> Result<RenewResponse, NetworkError>;
}

/// Pausable stream of storage offers.
///
/// While paused the producer holds back further offers; `next` still
/// returns offers already buffered.
#[async_trait]
pub trait OfferStream: Send {
    /// `None` once the stream has ended.
    async fn next(&mut self) -> Option<Result<Offer, NetworkError>>;

    fn pause(&mut self);

    fn resume(&mut self);
}

/// `RENEW` request asking a farmer to countersign a re-stamped contract.
#[derive(Debug, Clone, PartialEq)]
pub struct RenewMessage {
    /// `renter_id` of the contract as the farmer currently holds it
    pub renter_id: Option<String>,
    /// Migration key signature over the updated contract
    pub renter_signature: String,
    /// Updated contract object
    pub contract: Value,
    /// Sender contact
    pub contact: Contact,
}

impl RenewMessage {
    pub const METHOD: &'static str = "RENEW";

    pub fn to_value(&self) -> Value {
        json!({
            "method": Self::METHOD,
            "params": {
                "renter_id": self.renter_id,
                "renter_signature": self.renter_signature,
                "contract": self.contract,
                "contact": self.contact.to_value(),
            }
        })
    }
}

/// Farmer reply to a [`RenewMessage`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenewResponse {
    pub result: Option<Value>,
    pub error: Option<RpcError>,
}

impl RenewResponse {
    /// Reply carrying the countersigned contract.
    pub fn with_contract(contract: &Contract) -> Self {
        Self {
            result: Some(json!({ "contract": contract.to_object() })),
            error: None,
        }
    }

    pub fn with_error(message: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(RpcError::internal(message)),
        }
    }
}

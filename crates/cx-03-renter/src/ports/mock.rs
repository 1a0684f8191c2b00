//! Scriptable in-memory [`NetworkInterface`].
//!
//! Records every call so tests can assert what reached the network, serves a
//! fixed list of offers and answers `RENEW` according to a
//! [`RenewBehaviour`].

use crate::domain::error::NetworkError;
use crate::ports::outbound::{NetworkInterface, OfferStream, RenewMessage, RenewResponse};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use shared_types::{
    AuditRecords, Contact, Contract, DataChannelPointer, KeyPair, Offer, SignerRole, StorageItem,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// How the mock farmer answers a `RENEW` message.
#[derive(Clone)]
pub enum RenewBehaviour {
    /// Countersign the received contract as farmer with this key.
    Countersign(KeyPair),
    /// Reply with a fixed response.
    Respond(RenewResponse),
    /// Fail the transport.
    Fail(NetworkError),
}

/// Flow control observed on offer streams handed out by the mock.
#[derive(Debug, Default)]
pub struct OfferStreamStats {
    pub pauses: AtomicUsize,
    pub resumes: AtomicUsize,
    pub next_while_paused: AtomicUsize,
}

impl OfferStreamStats {
    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn resumes(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    pub fn next_while_paused(&self) -> usize {
        self.next_while_paused.load(Ordering::SeqCst)
    }
}

/// Offer stream over a fixed list of items.
pub struct MockOfferStream {
    items: VecDeque<Result<Offer, NetworkError>>,
    paused: bool,
    stats: Arc<OfferStreamStats>,
}

impl MockOfferStream {
    pub fn new(
        items: impl IntoIterator<Item = Result<Offer, NetworkError>>,
        stats: Arc<OfferStreamStats>,
    ) -> Self {
        Self {
            items: items.into_iter().collect(),
            paused: false,
            stats,
        }
    }
}

#[async_trait]
impl OfferStream for MockOfferStream {
    async fn next(&mut self) -> Option<Result<Offer, NetworkError>> {
        if self.paused {
            self.stats.next_while_paused.fetch_add(1, Ordering::SeqCst);
        }
        self.items.pop_front()
    }

    fn pause(&mut self) {
        self.paused = true;
        self.stats.pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn resume(&mut self) {
        self.paused = false;
        self.stats.resumes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Arguments of one `get_offer_stream` call.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferRequest {
    pub contract: Contract,
    pub max_offers: usize,
    pub blacklist: Vec<String>,
}

pub struct MockNetwork {
    contact: Contact,
    calls: Mutex<Vec<&'static str>>,
    seeds: Mutex<Option<Vec<String>>>,
    join_failure: Mutex<Option<NetworkError>>,
    failure: Mutex<Option<NetworkError>>,
    offers: Mutex<Vec<Result<Offer, NetworkError>>>,
    offer_requests: Mutex<Vec<OfferRequest>>,
    retrieval_contracts: Mutex<Vec<Contract>>,
    renew: Mutex<RenewBehaviour>,
    renew_requests: Mutex<Vec<RenewMessage>>,
    stream_stats: Arc<OfferStreamStats>,
    contacts_tx: broadcast::Sender<Contact>,
}

impl MockNetwork {
    pub fn new(contact: Contact) -> Self {
        let (contacts_tx, _) = broadcast::channel(64);
        Self {
            contact,
            calls: Mutex::new(Vec::new()),
            seeds: Mutex::new(None),
            join_failure: Mutex::new(None),
            failure: Mutex::new(None),
            offers: Mutex::new(Vec::new()),
            offer_requests: Mutex::new(Vec::new()),
            retrieval_contracts: Mutex::new(Vec::new()),
            renew: Mutex::new(RenewBehaviour::Fail(NetworkError::Transport(
                "no renew behaviour configured".into(),
            ))),
            renew_requests: Mutex::new(Vec::new()),
            stream_stats: Arc::new(OfferStreamStats::default()),
            contacts_tx,
        }
    }

    /// Offers served by every subsequent offer stream.
    pub fn set_offers(&self, offers: impl IntoIterator<Item = Result<Offer, NetworkError>>) {
        *self.offers.lock() = offers.into_iter().collect();
    }

    /// Make every RPC method fail with `err`.
    pub fn fail_calls(&self, err: Option<NetworkError>) {
        *self.failure.lock() = err;
    }

    pub fn fail_join(&self, err: Option<NetworkError>) {
        *self.join_failure.lock() = err;
    }

    pub fn set_renew_behaviour(&self, behaviour: RenewBehaviour) {
        *self.renew.lock() = behaviour;
    }

    /// Report `contact` as added to the routing table.
    pub fn announce_contact(&self, contact: Contact) -> usize {
        self.contacts_tx.send(contact).unwrap_or(0)
    }

    /// Names of the RPC methods called, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn joined_seeds(&self) -> Option<Vec<String>> {
        self.seeds.lock().clone()
    }

    pub fn offer_requests(&self) -> Vec<OfferRequest> {
        self.offer_requests.lock().clone()
    }

    /// Contracts passed to `get_retrieval_pointer`.
    pub fn retrieval_contracts(&self) -> Vec<Contract> {
        self.retrieval_contracts.lock().clone()
    }

    pub fn renew_requests(&self) -> Vec<RenewMessage> {
        self.renew_requests.lock().clone()
    }

    pub fn stream_stats(&self) -> Arc<OfferStreamStats> {
        Arc::clone(&self.stream_stats)
    }

    fn record(&self, method: &'static str) -> Result<(), NetworkError> {
        self.calls.lock().push(method);
        let failure = self.failure.lock().clone();
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn pointer(farmer: &Contact, contract: &Contract, operation: &str) -> DataChannelPointer {
        DataChannelPointer {
            farmer: farmer.clone(),
            hash: contract.data_hash().unwrap_or_default().to_string(),
            token: format!("token-{}", farmer.node_id),
            operation: operation.to_string(),
        }
    }

    fn countersign(key: &KeyPair, message: &RenewMessage) -> RenewResponse {
        let signed = Contract::from_object(&message.contract).and_then(|mut contract| {
            contract.sign(SignerRole::Farmer, key)?;
            Ok(contract)
        });
        match signed {
            Ok(contract) => RenewResponse::with_contract(&contract),
            Err(err) => RenewResponse::with_error(err.to_string()),
        }
    }
}

#[async_trait]
impl NetworkInterface for MockNetwork {
    fn contact(&self) -> Contact {
        self.contact.clone()
    }

    async fn join(&self, seeds: Vec<String>) -> Result<(), NetworkError> {
        *self.seeds.lock() = Some(seeds);
        let failure = self.join_failure.lock().clone();
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn subscribe_contacts(&self) -> broadcast::Receiver<Contact> {
        self.contacts_tx.subscribe()
    }

    async fn get_consignment_pointer(
        &self,
        farmer: &Contact,
        contract: &Contract,
        _audit: &AuditRecords,
    ) -> Result<DataChannelPointer, NetworkError> {
        self.record("getConsignmentPointer")?;
        Ok(Self::pointer(farmer, contract, "PUSH"))
    }

    async fn get_retrieval_pointer(
        &self,
        farmer: &Contact,
        contract: &Contract,
    ) -> Result<DataChannelPointer, NetworkError> {
        self.record("getRetrievalPointer")?;
        self.retrieval_contracts.lock().push(contract.clone());
        Ok(Self::pointer(farmer, contract, "PULL"))
    }

    async fn get_mirror_nodes(
        &self,
        sources: &[DataChannelPointer],
        destinations: &[Contact],
    ) -> Result<Vec<Contact>, NetworkError> {
        self.record("getMirrorNodes")?;
        Ok(destinations.iter().take(sources.len()).cloned().collect())
    }

    async fn get_storage_proof(
        &self,
        farmer: &Contact,
        item: &StorageItem,
    ) -> Result<Value, NetworkError> {
        self.record("getStorageProof")?;
        Ok(json!([item.hash, farmer.node_id.to_hex()]))
    }

    async fn ping(&self, _contact: &Contact) -> Result<(), NetworkError> {
        self.record("ping")
    }

    async fn get_offer_stream(
        &self,
        contract: &Contract,
        max_offers: usize,
        blacklist: &[String],
    ) -> Result<Box<dyn OfferStream>, NetworkError> {
        self.record("getStorageOffer")?;
        self.offer_requests.lock().push(OfferRequest {
            contract: contract.clone(),
            max_offers,
            blacklist: blacklist.to_vec(),
        });
        let offers: Vec<_> = self.offers.lock().iter().take(max_offers).cloned().collect();
        Ok(Box::new(MockOfferStream::new(
            offers,
            Arc::clone(&self.stream_stats),
        )))
    }

    async fn send(
        &self,
        _contact: &Contact,
        message: RenewMessage,
    ) -> Result<RenewResponse, NetworkError> {
        self.renew_requests.lock().push(message.clone());
        let behaviour = self.renew.lock().clone();
        match behaviour {
            RenewBehaviour::Countersign(key) => Ok(Self::countersign(&key, &message)),
            RenewBehaviour::Respond(response) => Ok(response),
            RenewBehaviour::Fail(err) => Err(err),
        }
    }
}

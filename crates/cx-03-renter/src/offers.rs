//! Storage offer orchestration.
//!
//! One offer stream per `getStorageOffer` call. Offers are handled one at a
//! time: the stream is paused when an offer arrives and resumed once that
//! offer has been stored. The first offer becomes the primary placement and
//! answers the caller; every later offer is queued as a mirror candidate.

use crate::domain::error::DispatchError;
use crate::domain::identity::RenterIdentity;
use crate::ports::outbound::{NetworkInterface, OfferStream};
use complex_telemetry::RENTER_OFFERS;
use shared_types::contract::DATA_HASH;
use shared_types::{
    now_millis, Contract, ContractError, MirrorRecord, MirrorStore, Offer, StorageItem,
    StorageManager, StoreError,
};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Offers handled by one drain task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OfferTally {
    pub primary: usize,
    pub mirrors: usize,
    pub mirror_failures: usize,
}

/// An open offer stream being drained in the background.
pub struct OfferSession {
    /// Resolves with the primary offer. Closed without a value when the
    /// stream ends or fails before any offer arrived.
    pub first: oneshot::Receiver<Result<Offer, DispatchError>>,
    /// Completes when the stream is exhausted.
    pub drain: JoinHandle<OfferTally>,
}

#[derive(Clone)]
pub struct StorageOfferOrchestrator {
    identity: Arc<RenterIdentity>,
    network: Arc<dyn NetworkInterface>,
    storage: Arc<dyn StorageManager>,
    mirrors: Arc<dyn MirrorStore>,
    max_offers: usize,
}

impl StorageOfferOrchestrator {
    pub fn new(
        identity: Arc<RenterIdentity>,
        network: Arc<dyn NetworkInterface>,
        storage: Arc<dyn StorageManager>,
        mirrors: Arc<dyn MirrorStore>,
        max_offers: usize,
    ) -> Self {
        Self {
            identity,
            network,
            storage,
            mirrors,
            max_offers,
        }
    }

    /// Sign `contract`, open its offer stream and start draining it.
    pub async fn open(
        &self,
        mut contract: Contract,
        blacklist: Vec<String>,
    ) -> Result<OfferSession, DispatchError> {
        self.identity.sign_storage_contract(&mut contract)?;
        let hash = contract
            .data_hash()
            .ok_or(ContractError::MissingField(DATA_HASH))?
            .to_string();

        let stream = self
            .network
            .get_offer_stream(&contract, self.max_offers, &blacklist)
            .await?;
        debug!(data_hash = %hash, max_offers = self.max_offers, "Opened offer stream");

        let (first_tx, first_rx) = oneshot::channel();
        let drain = tokio::spawn(self.clone().drain(hash, stream, first_tx));

        Ok(OfferSession {
            first: first_rx,
            drain,
        })
    }

    /// The primary offer for `contract`, or `None` if the stream produced
    /// none. Mirrors keep draining after this returns.
    pub async fn get_storage_offer(
        &self,
        contract: Contract,
        blacklist: Vec<String>,
    ) -> Result<Option<Offer>, DispatchError> {
        let session = self.open(contract, blacklist).await?;
        match session.first.await {
            Ok(first) => first.map(Some),
            Err(_) => Ok(None),
        }
    }

    async fn drain(
        self,
        hash: String,
        mut stream: Box<dyn OfferStream>,
        first: oneshot::Sender<Result<Offer, DispatchError>>,
    ) -> OfferTally {
        let mut tally = OfferTally::default();
        let mut first = Some(first);

        loop {
            let offer = match stream.next().await {
                Some(Ok(offer)) => offer,
                Some(Err(e)) => {
                    error!(data_hash = %hash, error = %e, "Offer stream failed");
                    break;
                }
                None => {
                    info!(
                        data_hash = %hash,
                        mirrors = tally.mirrors,
                        "Finished handling offers for shard"
                    );
                    break;
                }
            };

            stream.pause();

            let Some(sink) = first.take() else {
                self.queue_mirror(&offer, &mut tally).await;
                stream.resume();
                continue;
            };

            match self.store_primary(&hash, &offer).await {
                Ok(()) => {
                    tally.primary += 1;
                    RENTER_OFFERS.with_label_values(&["primary"]).inc();
                    stream.resume();
                    if sink.send(Ok(offer)).is_err() {
                        debug!(data_hash = %hash, "Offer caller went away");
                    }
                }
                Err(e) => {
                    warn!(data_hash = %hash, error = %e, "Unable to save primary offer");
                    let _ = sink.send(Err(e.into()));
                    return tally;
                }
            }
        }

        tally
    }

    async fn store_primary(&self, hash: &str, offer: &Offer) -> Result<(), StoreError> {
        let mut item = match self.storage.load(hash).await {
            Ok(item) => item,
            Err(StoreError::NotFound(_)) => StorageItem::new(hash),
            Err(e) => {
                debug!(data_hash = hash, error = %e, "Starting fresh storage item");
                StorageItem::new(hash)
            }
        };
        item.add_contract(&offer.contact, offer.contract.clone());
        self.storage.save(&item).await
    }

    async fn queue_mirror(&self, offer: &Offer, tally: &mut OfferTally) {
        match self
            .mirrors
            .create(MirrorRecord::queued(offer, now_millis()))
            .await
        {
            Ok(()) => {
                tally.mirrors += 1;
                RENTER_OFFERS.with_label_values(&["mirror"]).inc();
            }
            Err(e) => {
                tally.mirror_failures += 1;
                RENTER_OFFERS.with_label_values(&["mirror_failed"]).inc();
                warn!(
                    farmer = %offer.contact.node_id,
                    error = %e,
                    "Failed to add mirror to pool"
                );
            }
        }
    }
}

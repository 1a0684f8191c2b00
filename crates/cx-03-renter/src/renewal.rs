//! Contract renewal before retrieval.
//!
//! Contracts signed before the pool moved to HD identities name the legacy
//! migration key as renter. Before retrieving such a shard the renter
//! re-stamps the contract with its HD identity, proves ownership with the
//! migration key and asks the farmer to countersign:
//!
//! ```text
//! renter                                   farmer
//!   │  RENEW {renter_id, renter_signature,   │
//!   │         contract, contact}             │
//!   │ ─────────────────────────────────────▶ │
//!   │  {result: {contract}}                  │
//!   │ ◀───────────────────────────────────── │
//!   │  diff == [farmer_signature]?           │
//!   │  farmer signature valid?               │
//!   │  save to storage item                  │
//! ```

use crate::domain::error::RenewalError;
use crate::domain::identity::RenterIdentity;
use crate::ports::outbound::{NetworkInterface, RenewMessage};
use complex_telemetry::RENTER_RENEWALS;
use shared_types::contract::{DATA_HASH, FARMER_SIGNATURE, RENTER_ID};
use shared_types::{Contact, Contract, ContractError, SignerRole, StorageManager};
use std::sync::Arc;
use tracing::{info, warn};

/// Renews legacy contracts to the renter's HD identity.
#[derive(Clone)]
pub struct ContractRenewer {
    identity: Arc<RenterIdentity>,
    network: Arc<dyn NetworkInterface>,
    storage: Arc<dyn StorageManager>,
}

impl ContractRenewer {
    pub fn new(
        identity: Arc<RenterIdentity>,
        network: Arc<dyn NetworkInterface>,
        storage: Arc<dyn StorageManager>,
    ) -> Self {
        Self {
            identity,
            network,
            storage,
        }
    }

    /// Renewal applies only with a migration key and to contracts without
    /// an HD key.
    pub fn needs_renewal(&self, contract: &Contract) -> bool {
        self.identity.migration_key().is_some() && !contract.has_hd_key()
    }

    /// The contract retrieval should proceed with: the renewed one when a
    /// renewal took place, `contract` itself otherwise.
    pub async fn ensure_renewed(
        &self,
        farmer: &Contact,
        contract: Contract,
    ) -> Result<Contract, RenewalError> {
        if !self.needs_renewal(&contract) {
            return Ok(contract);
        }

        match self.renew(farmer, &contract).await {
            Ok(renewed) => {
                RENTER_RENEWALS.with_label_values(&["renewed"]).inc();
                info!(
                    farmer = %farmer.node_id,
                    data_hash = renewed.data_hash().unwrap_or_default(),
                    "Renewed contract"
                );
                Ok(renewed)
            }
            Err(e) => {
                RENTER_RENEWALS.with_label_values(&["failed"]).inc();
                warn!(farmer = %farmer.node_id, error = %e, "Contract renewal failed");
                Err(e)
            }
        }
    }

    async fn renew(&self, farmer: &Contact, contract: &Contract) -> Result<Contract, RenewalError> {
        let Some(migration_key) = self.identity.migration_key() else {
            return Ok(contract.clone());
        };

        let mut updated = contract.clone();
        self.identity
            .sign_storage_contract(&mut updated)
            .map_err(RenewalError::Signing)?;
        let renter_signature = updated
            .sign_external(migration_key)
            .map_err(RenewalError::Signing)?;

        let message = RenewMessage {
            renter_id: contract.get_str(RENTER_ID).map(str::to_string),
            renter_signature,
            contract: updated.to_object(),
            contact: self.network.contact(),
        };

        let response = self
            .network
            .send(farmer, message)
            .await
            .map_err(RenewalError::Transport)?;

        let returned = match response.result.as_ref().and_then(|r| r.get("contract")) {
            Some(object) => Contract::from_object(object)
                .map_err(|e| RenewalError::PeerError(format!("Malformed contract: {e}")))?,
            None => {
                let message = response
                    .error
                    .map(|e| e.message)
                    .unwrap_or_else(|| "No contract in renewal response".to_string());
                return Err(RenewalError::PeerError(message));
            }
        };

        validate_renewed_contract(&updated, &returned)?;
        self.save(&returned).await?;
        Ok(returned)
    }

    async fn save(&self, contract: &Contract) -> Result<(), RenewalError> {
        let data_hash = contract
            .data_hash()
            .ok_or(RenewalError::Signing(ContractError::MissingField(DATA_HASH)))?;
        let farmer_id = contract.farmer_id().map_err(RenewalError::BadSignature)?;

        let mut item = self
            .storage
            .load(data_hash)
            .await
            .map_err(RenewalError::Persistence)?;

        item.remove_contract(&farmer_id);
        item.contracts.insert(farmer_id, contract.clone());

        self.storage
            .save(&item)
            .await
            .map_err(RenewalError::Persistence)
    }
}

/// Accept `after` only if it differs from `before` in the farmer signature
/// alone and that signature verifies against its `farmer_id`.
pub fn validate_renewed_contract(before: &Contract, after: &Contract) -> Result<(), RenewalError> {
    let diff = Contract::diff(before, after);
    if diff.len() != 1 || diff[0] != FARMER_SIGNATURE {
        return Err(RenewalError::InvalidDiff(diff));
    }

    let farmer_id = after.farmer_id().map_err(RenewalError::BadSignature)?;
    after
        .verify(SignerRole::Farmer, &farmer_id)
        .map_err(RenewalError::BadSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::NetworkError;
    use crate::ports::mock::{MockNetwork, RenewBehaviour};
    use crate::ports::outbound::RenewResponse;
    use serde_json::{json, Value};
    use shared_types::contract::RENTER_HD_KEY;
    use shared_types::{ExtendedPrivateKey, InMemoryStorageManager, KeyPair, StorageItem, StoreError};

    const HASH: &str = "abababababababababababababababababababab";

    fn hd_key() -> ExtendedPrivateKey {
        ExtendedPrivateKey::from_hex(&format!("{}{}", "11".repeat(32), "22".repeat(32))).unwrap()
    }

    fn migration_key() -> KeyPair {
        KeyPair::from_hex(&"33".repeat(32)).unwrap()
    }

    fn farmer_key() -> KeyPair {
        KeyPair::from_hex(&"44".repeat(32)).unwrap()
    }

    fn farmer() -> Contact {
        Contact::new(farmer_key().node_id(), "10.0.0.9", 4000)
    }

    fn legacy_contract() -> Contract {
        Contract::from_object(&json!({
            "data_hash": HASH,
            "data_size": 2048,
            "renter_id": migration_key().node_id().to_hex(),
            "farmer_id": farmer_key().node_id().to_hex(),
        }))
        .unwrap()
    }

    struct Fixture {
        renewer: ContractRenewer,
        network: Arc<MockNetwork>,
        storage: Arc<InMemoryStorageManager>,
        identity: Arc<RenterIdentity>,
    }

    fn fixture(migration: Option<KeyPair>) -> Fixture {
        let identity = Arc::new(RenterIdentity::new(hd_key(), 0, migration).unwrap());
        let network = Arc::new(MockNetwork::new(Contact::new(
            identity.node_id(),
            "127.0.0.1",
            4100,
        )));
        let storage = Arc::new(InMemoryStorageManager::new());
        let mut item = StorageItem::new(HASH);
        item.add_contract(&farmer(), legacy_contract());
        storage.insert(item);

        let renewer = ContractRenewer::new(
            Arc::clone(&identity),
            network.clone() as Arc<dyn NetworkInterface>,
            storage.clone() as Arc<dyn StorageManager>,
        );
        Fixture {
            renewer,
            network,
            storage,
            identity,
        }
    }

    fn stamped(identity: &RenterIdentity) -> Contract {
        let mut contract = legacy_contract();
        identity.sign_storage_contract(&mut contract).unwrap();
        contract
    }

    #[tokio::test]
    async fn test_skipped_without_migration_key() {
        let f = fixture(None);
        let contract = legacy_contract();
        let result = f
            .renewer
            .ensure_renewed(&farmer(), contract.clone())
            .await
            .unwrap();
        assert_eq!(result, contract);
        assert!(f.network.renew_requests().is_empty());
    }

    #[tokio::test]
    async fn test_skipped_for_hd_contract() {
        let f = fixture(Some(migration_key()));
        let mut contract = legacy_contract();
        contract.set(RENTER_HD_KEY, Value::String("xpub".into()));
        assert!(!f.renewer.needs_renewal(&contract));

        f.renewer.ensure_renewed(&farmer(), contract).await.unwrap();
        assert!(f.network.renew_requests().is_empty());
    }

    #[tokio::test]
    async fn test_countersigned_contract_is_saved() {
        let f = fixture(Some(migration_key()));
        f.network
            .set_renew_behaviour(RenewBehaviour::Countersign(farmer_key()));

        let renewed = f
            .renewer
            .ensure_renewed(&farmer(), legacy_contract())
            .await
            .unwrap();

        assert!(renewed.has_hd_key());
        assert!(renewed
            .verify(SignerRole::Farmer, &farmer_key().node_id())
            .is_ok());
        assert!(renewed
            .verify(SignerRole::Renter, &f.identity.node_id())
            .is_ok());

        let item = f.storage.get(HASH).unwrap();
        assert_eq!(item.get_contract(&farmer_key().node_id()), Some(&renewed));
        assert_eq!(item.contracts.len(), 1);

        let requests = f.network.renew_requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(
            request.renter_id.as_deref(),
            Some(migration_key().node_id().to_hex().as_str())
        );
        assert_eq!(request.contact.node_id, f.identity.node_id());
        let updated = Contract::from_object(&request.contract).unwrap();
        assert!(updated
            .verify_external(&request.renter_signature, &migration_key().node_id())
            .is_ok());
    }

    #[tokio::test]
    async fn test_peer_error_is_surfaced() {
        let f = fixture(Some(migration_key()));
        f.network
            .set_renew_behaviour(RenewBehaviour::Respond(RenewResponse::with_error(
                "Unknown contract",
            )));

        let err = f
            .renewer
            .ensure_renewed(&farmer(), legacy_contract())
            .await
            .unwrap_err();
        assert_eq!(err, RenewalError::PeerError("Unknown contract".into()));
    }

    #[tokio::test]
    async fn test_transport_failure_is_surfaced() {
        let f = fixture(Some(migration_key()));
        f.network
            .set_renew_behaviour(RenewBehaviour::Fail(NetworkError::Transport(
                "connection refused".into(),
            )));

        let err = f
            .renewer
            .ensure_renewed(&farmer(), legacy_contract())
            .await
            .unwrap_err();
        assert!(matches!(err, RenewalError::Transport(_)));
        assert_eq!(
            f.storage.get(HASH).unwrap().get_contract(&farmer_key().node_id()),
            Some(&legacy_contract())
        );
    }

    #[tokio::test]
    async fn test_storage_failure_fails_renewal() {
        let f = fixture(Some(migration_key()));
        f.network
            .set_renew_behaviour(RenewBehaviour::Countersign(farmer_key()));
        f.storage.set_failing(true);

        let err = f
            .renewer
            .ensure_renewed(&farmer(), legacy_contract())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RenewalError::Persistence(StoreError::Backend(_))
        ));
    }

    #[test]
    fn test_validator_accepts_farmer_signature_only() {
        let identity = RenterIdentity::new(hd_key(), 0, None).unwrap();
        let before = stamped(&identity);
        let mut after = before.clone();
        after.sign(SignerRole::Farmer, &farmer_key()).unwrap();

        assert!(validate_renewed_contract(&before, &after).is_ok());
    }

    #[test]
    fn test_validator_rejects_extra_changes() {
        let identity = RenterIdentity::new(hd_key(), 0, None).unwrap();
        let before = stamped(&identity);
        let mut after = before.clone();
        after.set("data_size", json!(1));
        after.sign(SignerRole::Farmer, &farmer_key()).unwrap();

        assert_eq!(
            validate_renewed_contract(&before, &after),
            Err(RenewalError::InvalidDiff(vec![
                "data_size".to_string(),
                FARMER_SIGNATURE.to_string()
            ]))
        );
        assert!(matches!(
            validate_renewed_contract(&before, &before),
            Err(RenewalError::InvalidDiff(diff)) if diff.is_empty()
        ));
    }

    #[test]
    fn test_validator_rejects_wrong_signer() {
        let identity = RenterIdentity::new(hd_key(), 0, None).unwrap();
        let before = stamped(&identity);
        let mut after = before.clone();
        after.sign(SignerRole::Farmer, &migration_key()).unwrap();

        assert!(matches!(
            validate_renewed_contract(&before, &after),
            Err(RenewalError::BadSignature(_))
        ));
    }
}

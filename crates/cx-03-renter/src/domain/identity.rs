//! Renter identity.
//!
//! The operating key is child `network_index` of the configured extended
//! key. Contracts are stamped with the parent's public extended key and the
//! index so farmers can check that the operating key belongs to the pool.
//! An optional migration key is the legacy key older contracts name.

use crate::domain::config::RenterConfig;
use crate::domain::error::RenterError;
use serde_json::Value;
use shared_types::contract::{RENTER_HD_INDEX, RENTER_HD_KEY, RENTER_ID};
use shared_types::{Contract, ContractError, ExtendedPrivateKey, KeyPair, NodeId, SignerRole};

pub struct RenterIdentity {
    hd_key: ExtendedPrivateKey,
    hd_index: u32,
    key_pair: KeyPair,
    migration_key: Option<KeyPair>,
}

impl RenterIdentity {
    pub fn new(
        hd_key: ExtendedPrivateKey,
        hd_index: u32,
        migration_key: Option<KeyPair>,
    ) -> Result<Self, RenterError> {
        let key_pair = hd_key.derive_child(hd_index)?.key_pair();
        Ok(Self {
            hd_key,
            hd_index,
            key_pair,
            migration_key,
        })
    }

    pub fn from_config(config: &RenterConfig) -> Result<Self, RenterError> {
        let hd_key = ExtendedPrivateKey::from_hex(&config.network_private_extended_key)?;
        let migration_key = config
            .migration_private_key
            .as_deref()
            .map(KeyPair::from_hex)
            .transpose()?;
        Self::new(hd_key, config.network_index, migration_key)
    }

    pub fn node_id(&self) -> NodeId {
        self.key_pair.node_id()
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    pub fn hd_index(&self) -> u32 {
        self.hd_index
    }

    pub fn hd_public_key(&self) -> String {
        self.hd_key.public_extended_hex()
    }

    pub fn migration_key(&self) -> Option<&KeyPair> {
        self.migration_key.as_ref()
    }

    /// Stamp the HD identity onto `contract` and sign it as renter.
    pub fn sign_storage_contract(&self, contract: &mut Contract) -> Result<(), ContractError> {
        contract.set(RENTER_HD_KEY, Value::String(self.hd_public_key()));
        contract.set(RENTER_HD_INDEX, Value::from(self.hd_index));
        contract.set(RENTER_ID, Value::String(self.node_id().to_hex()));
        contract.sign(SignerRole::Renter, &self.key_pair)
    }
}

impl std::fmt::Debug for RenterIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenterIdentity")
            .field("node_id", &self.node_id())
            .field("hd_index", &self.hd_index)
            .field("has_migration_key", &self.migration_key.is_some())
            .finish()
    }
}

//! # Storage Contract
//!
//! A signed agreement between a renter and a farmer, held as an ordered field
//! map. Only the fields below are read by name; everything else is carried
//! through untouched.
//!
//! Both parties sign keccak-256 of the canonical JSON (sorted keys, no
//! whitespace) of the contract with the two signature fields removed, so a
//! countersignature never invalidates the other party's signature.

use crate::entities::NodeId;
use crate::errors::ContractError;
use crate::keys::{decode_signature, keccak256, recover_node_id, KeyPair};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

pub const DATA_HASH: &str = "data_hash";
pub const RENTER_ID: &str = "renter_id";
pub const RENTER_HD_KEY: &str = "renter_hd_key";
pub const RENTER_HD_INDEX: &str = "renter_hd_index";
pub const RENTER_SIGNATURE: &str = "renter_signature";
pub const FARMER_ID: &str = "farmer_id";
pub const FARMER_SIGNATURE: &str = "farmer_signature";

/// Which party a signature belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerRole {
    Renter,
    Farmer,
}

impl SignerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Renter => "renter",
            Self::Farmer => "farmer",
        }
    }

    pub fn signature_field(&self) -> &'static str {
        match self {
            Self::Renter => RENTER_SIGNATURE,
            Self::Farmer => FARMER_SIGNATURE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Contract(BTreeMap<String, Value>);

impl Contract {
    pub fn from_object(value: &Value) -> Result<Self, ContractError> {
        match value {
            Value::Object(map) => Ok(Self(
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            )),
            _ => Err(ContractError::NotAnObject),
        }
    }

    pub fn to_object(&self) -> Value {
        Value::Object(self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn data_hash(&self) -> Option<&str> {
        self.get_str(DATA_HASH)
    }

    pub fn farmer_id(&self) -> Result<NodeId, ContractError> {
        self.get_str(FARMER_ID)
            .and_then(|s| s.parse().ok())
            .ok_or(ContractError::MissingField(FARMER_ID))
    }

    /// True when the contract was signed under an HD renter identity.
    pub fn has_hd_key(&self) -> bool {
        matches!(self.get(RENTER_HD_KEY), Some(v) if !v.is_null())
    }

    /// Digest both parties sign.
    pub fn signing_hash(&self) -> [u8; 32] {
        let unsigned: BTreeMap<&String, &Value> = self
            .0
            .iter()
            .filter(|(k, _)| k.as_str() != RENTER_SIGNATURE && k.as_str() != FARMER_SIGNATURE)
            .collect();
        keccak256(&serde_json::to_vec(&unsigned).unwrap_or_default())
    }

    /// Sign as `role`, storing the signature in the role's signature field.
    pub fn sign(&mut self, role: SignerRole, key: &KeyPair) -> Result<(), ContractError> {
        let signature = self.sign_external(key)?;
        self.set(role.signature_field(), Value::String(signature));
        Ok(())
    }

    /// Detached signature over the contract, as hex.
    pub fn sign_external(&self, key: &KeyPair) -> Result<String, ContractError> {
        Ok(hex::encode(key.sign_prehash(&self.signing_hash())?))
    }

    /// Check that `role`'s signature was made by `node_id`.
    pub fn verify(&self, role: SignerRole, node_id: &NodeId) -> Result<(), ContractError> {
        let field = role.signature_field();
        let signature = self
            .get_str(field)
            .ok_or(ContractError::MissingField(field))?;
        self.verify_with(role, signature, node_id)
    }

    /// Check a detached signature against `node_id`.
    pub fn verify_external(&self, signature: &str, node_id: &NodeId) -> Result<(), ContractError> {
        self.verify_with(SignerRole::Renter, signature, node_id)
    }

    fn verify_with(
        &self,
        role: SignerRole,
        signature: &str,
        node_id: &NodeId,
    ) -> Result<(), ContractError> {
        let sig = decode_signature(signature)
            .map_err(|e| ContractError::MalformedSignature(e.to_string()))?;
        let recovered = recover_node_id(&self.signing_hash(), &sig)?;
        if &recovered != node_id {
            return Err(ContractError::SignatureMismatch {
                role: role.as_str(),
                expected: node_id.to_hex(),
            });
        }
        Ok(())
    }

    /// Names of the fields whose values differ between `a` and `b`, sorted.
    pub fn diff(a: &Contract, b: &Contract) -> Vec<String> {
        let keys: BTreeSet<&String> = a.0.keys().chain(b.0.keys()).collect();
        keys.into_iter()
            .filter(|k| a.0.get(*k) != b.0.get(*k))
            .cloned()
            .collect()
    }
}

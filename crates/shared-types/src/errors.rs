//! # Error Types
//!
//! Defines error types shared by the landlord and renter crates.

use thiserror::Error;

/// Errors raised by the Storage collaborators (contact, mirror and item stores).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Requested record does not exist.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Backend rejected the read or write.
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Errors raised while signing, verifying or decoding a storage contract.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContractError {
    /// Contract object was not a JSON object.
    #[error("Contract must be a JSON object")]
    NotAnObject,

    /// A field the operation needs is absent or has the wrong type.
    #[error("Contract field {0} missing or malformed")]
    MissingField(&'static str),

    /// Signature field did not decode to 65 bytes of r||s||v.
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    /// Signature recovered to a different node id than claimed.
    #[error("Signature does not match {role} id {expected}")]
    SignatureMismatch { role: &'static str, expected: String },

    /// Signing or recovery with the key failed.
    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Errors raised while decoding or deriving key material.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    /// Text was not valid hex.
    #[error("Key is not valid hex: {0}")]
    InvalidHex(String),

    /// Decoded key material had the wrong length.
    #[error("Key must be {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Secret scalar was zero or not below the curve order.
    #[error("Secret key is out of range")]
    InvalidScalar,

    /// Hardened indices cannot be derived from public data.
    #[error("Index {0} is hardened; only indices below 2^31 are supported")]
    HardenedIndex(u32),

    /// ECDSA signing failed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Public key recovery from a signature failed.
    #[error("Signature recovery failed")]
    Recovery,
}

/// Errors raised when a wire record cannot be reconstructed into an entity.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Node id was not 40 hex characters.
    #[error("Invalid node id: {0}")]
    InvalidNodeId(String),

    /// Record had an unexpected shape.
    #[error("Invalid {what}: {reason}")]
    InvalidRecord { what: &'static str, reason: String },
}

impl DecodeError {
    pub fn record(what: &'static str, err: impl std::fmt::Display) -> Self {
        Self::InvalidRecord {
            what,
            reason: err.to_string(),
        }
    }
}

/// Errors raised when a work envelope fails validation.
///
/// Each variant maps to one malformed-envelope case so callers can report
/// which field was wrong.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Body was not valid JSON.
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// Body was valid JSON but not an object.
    #[error("Envelope must be a JSON object")]
    NotAnObject,

    /// `id` was absent or not a string.
    #[error("Invalid id: must be a string")]
    InvalidId,

    /// `method` was absent or not a string.
    #[error("Invalid method: must be a string")]
    InvalidMethod,

    /// `params` was absent or not an array.
    #[error("Invalid params: must be an array")]
    InvalidParams,
}

//! # Key Material
//!
//! secp256k1 key pairs and the hierarchical (HD) extended key a renter
//! derives its operating identity from.
//!
//! ## Encodings
//!
//! - private key: 32-byte secret as hex
//! - extended private key: 32-byte chain code then 32-byte secret, as hex
//! - public extended key: 32-byte chain code then 33-byte compressed point, as hex
//! - signature: 65 bytes `r || s || v` with `v` in {0, 1}, as hex
//!
//! Child derivation is non-hardened only:
//! `I = HMAC-SHA512(chain_code, compressed_parent_pubkey || be32(index))`,
//! child secret = `I[..32] + parent mod n`, child chain code = `I[32..]`.

use crate::entities::NodeId;
use crate::errors::KeyError;
use hmac::{Hmac, Mac};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, Scalar, SecretKey};
use sha2::Sha512;
use sha3::{Digest, Keccak256};
use std::fmt;
use zeroize::Zeroize;

type HmacSha512 = Hmac<Sha512>;

/// First index that requires hardened derivation.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Keccak-256 digest.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Node id of a public key: last 20 bytes of keccak-256 over the
/// uncompressed point without its 0x04 prefix.
pub fn node_id_from_key(key: &VerifyingKey) -> NodeId {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut id = [0u8; 20];
    id.copy_from_slice(&hash[12..]);
    NodeId(id)
}

/// Recover the signer's node id from a 65-byte recoverable signature.
pub fn recover_node_id(prehash: &[u8; 32], signature: &[u8; 65]) -> Result<NodeId, KeyError> {
    let recovery_id = RecoveryId::from_byte(signature[64]).ok_or(KeyError::Recovery)?;
    let sig = Signature::from_slice(&signature[..64]).map_err(|_| KeyError::Recovery)?;
    let key = VerifyingKey::recover_from_prehash(prehash, &sig, recovery_id)
        .map_err(|_| KeyError::Recovery)?;
    Ok(node_id_from_key(&key))
}

/// Decode a hex signature into its fixed 65-byte form.
pub fn decode_signature(hex_sig: &str) -> Result<[u8; 65], KeyError> {
    let bytes = hex::decode(hex_sig).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| KeyError::InvalidLength {
        expected: 65,
        actual: len,
    })
}

fn decode_fixed<const N: usize>(text: &str) -> Result<[u8; N], KeyError> {
    let mut bytes = hex::decode(text.trim()).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
    let len = bytes.len();
    let out: Result<[u8; N], _> = bytes.as_slice().try_into();
    bytes.zeroize();
    out.map_err(|_| KeyError::InvalidLength {
        expected: N,
        actual: len,
    })
}

// =============================================================================
// KEY PAIR
// =============================================================================

/// A secp256k1 signing key and its derived node id.
#[derive(Clone)]
pub struct KeyPair {
    signing: SigningKey,
}

impl KeyPair {
    pub fn from_secret(secret: &SecretKey) -> Self {
        Self {
            signing: SigningKey::from(secret),
        }
    }

    /// Load a 32-byte hex private key.
    pub fn from_hex(text: &str) -> Result<Self, KeyError> {
        let mut bytes = decode_fixed::<32>(text)?;
        let secret = SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidScalar);
        bytes.zeroize();
        Ok(Self::from_secret(&secret?))
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing.verifying_key()
    }

    pub fn node_id(&self) -> NodeId {
        node_id_from_key(self.verifying_key())
    }

    /// 33-byte SEC1 compressed public key.
    pub fn public_key_compressed(&self) -> Vec<u8> {
        self.verifying_key().to_encoded_point(true).as_bytes().to_vec()
    }

    /// Sign a 32-byte digest, returning `r || s || v`.
    pub fn sign_prehash(&self, prehash: &[u8; 32]) -> Result<[u8; 65], KeyError> {
        let (sig, recovery_id) = self
            .signing
            .sign_prehash_recoverable(prehash)
            .map_err(|e| KeyError::Signing(e.to_string()))?;
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = recovery_id.to_byte();
        Ok(out)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("node_id", &self.node_id())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// EXTENDED KEY
// =============================================================================

/// An HD extended private key.
#[derive(Clone)]
pub struct ExtendedPrivateKey {
    chain_code: [u8; 32],
    secret: SecretKey,
}

impl ExtendedPrivateKey {
    pub fn new(chain_code: [u8; 32], secret: SecretKey) -> Self {
        Self { chain_code, secret }
    }

    /// Decode 64 bytes of hex: chain code then secret.
    pub fn from_hex(text: &str) -> Result<Self, KeyError> {
        let mut bytes = decode_fixed::<64>(text)?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&bytes[..32]);
        let secret = SecretKey::from_slice(&bytes[32..]).map_err(|_| KeyError::InvalidScalar);
        bytes.zeroize();
        Ok(Self::new(chain_code, secret?))
    }

    pub fn to_hex(&self) -> String {
        let mut out = hex::encode(self.chain_code);
        out.push_str(&hex::encode(self.secret.to_bytes()));
        out
    }

    pub fn key_pair(&self) -> KeyPair {
        KeyPair::from_secret(&self.secret)
    }

    /// Chain code and compressed public key as hex.
    pub fn public_extended_hex(&self) -> String {
        let mut out = hex::encode(self.chain_code);
        out.push_str(&hex::encode(self.key_pair().public_key_compressed()));
        out
    }

    /// Derive the non-hardened child at `index`.
    pub fn derive_child(&self, index: u32) -> Result<Self, KeyError> {
        if index >= HARDENED_OFFSET {
            return Err(KeyError::HardenedIndex(index));
        }

        let mut mac = HmacSha512::new_from_slice(&self.chain_code).map_err(|_| {
            KeyError::InvalidLength {
                expected: 32,
                actual: self.chain_code.len(),
            }
        })?;
        mac.update(&self.key_pair().public_key_compressed());
        mac.update(&index.to_be_bytes());
        let digest = mac.finalize().into_bytes();
        let (il, ir) = digest.split_at(32);

        let tweak: Option<Scalar> = Scalar::from_repr(FieldBytes::clone_from_slice(il)).into();
        let tweak = tweak.ok_or(KeyError::InvalidScalar)?;
        let child = tweak + *self.secret.to_nonzero_scalar();
        let secret = SecretKey::from_bytes(&child.to_repr()).map_err(|_| KeyError::InvalidScalar)?;

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(ir);
        Ok(Self::new(chain_code, secret))
    }
}

impl Drop for ExtendedPrivateKey {
    fn drop(&mut self) {
        self.chain_code.zeroize();
    }
}

impl fmt::Debug for ExtendedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedPrivateKey")
            .field("public", &self.public_extended_hex())
            .finish_non_exhaustive()
    }
}

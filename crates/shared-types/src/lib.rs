//! # Shared Types Crate
//!
//! Types shared by the landlord (job broker) and the renter pool.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: the wire envelope and the RPC method registry
//!   are defined once here so the landlord's router and the renter's dispatch
//!   table can never disagree on method names.
//! - **Opaque Protocol Objects**: contracts are carried as keyed field maps;
//!   only the handful of fields the pool reads are given names.
//! - **Collaborator Contracts**: persistence is reached only through the
//!   [`storage`] traits.

pub mod contract;
pub mod entities;
pub mod envelope;
pub mod errors;
pub mod keys;
pub mod methods;
pub mod storage;

pub use contract::{Contract, SignerRole};
pub use entities::*;
pub use envelope::{codes, RpcError, WorkRequest, WorkResult};
pub use errors::*;
pub use keys::{ExtendedPrivateKey, KeyPair};
pub use methods::{RoutingSource, RpcMethod};
pub use storage::{
    ContactStore, InMemoryContactStore, InMemoryMirrorStore, InMemoryStorageManager, MirrorStore,
    StorageManager,
};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

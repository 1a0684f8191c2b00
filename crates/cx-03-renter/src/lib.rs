//! CX-03 Renter - worker executing storage network RPCs for the landlord.
//!
//! A renter subscribes to a contiguous slice of the 256 `work-x-NN` queues
//! centred on the first byte of its node id, runs every job it receives
//! against the storage network and publishes the outcome on the result
//! topic.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        RENTER (cx-03)                         │
//! ├───────────────────────────────────────────────────────────────┤
//! │  work-x-NN ... work-x-MM ──▶ consumers ──▶ Dispatcher          │
//! │                                             │                 │
//! │            ┌──────────────────┬─────────────┼───────────────┐ │
//! │            ▼                  ▼             ▼               │ │
//! │    ContractRenewer   StorageOfferOrchestrator   NetworkInterface
//! │            │                  │                             │ │
//! │            └──────── StorageManager / MirrorStore ──────────┘ │
//! │                                             │                 │
//! │                          WorkResult ──▶ publish(work.close)   │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Result codes
//!
//! | Code | When |
//! |------|------|
//! | `-32601` | method outside the allow-list; the network is not called |
//! | `-32603` | params did not decode, or the call, renewal or storage failed |
//!
//! # Usage
//!
//! ```ignore
//! use cx_03_renter::{RenterConfig, RenterPorts, RenterService};
//!
//! let mut renter = RenterService::new(config, ports)?;
//! let range = renter.start().await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod dispatcher;
pub mod domain;
pub mod offers;
pub mod ports;
pub mod renewal;
pub mod service;

pub use dispatcher::Dispatcher;
pub use domain::{
    ConfigError, DispatchError, NetworkError, RenewalError, RenterConfig, RenterError,
    RenterIdentity, RpcCall, RpcReply,
};
pub use offers::{OfferSession, OfferTally, StorageOfferOrchestrator};
pub use ports::{MockNetwork, NetworkInterface, OfferStream, RenewMessage, RenewResponse};
pub use renewal::{validate_renewed_contract, ContractRenewer};
pub use service::{RenterPorts, RenterService, RenterState};

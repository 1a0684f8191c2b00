//! # Ports Layer
//!
//! - **Outbound:** the storage network the renter drives on behalf of callers.
//! - **Mock:** a scriptable network used by this crate's tests and by the
//!   integration suite.

pub mod mock;
pub mod outbound;

pub use mock::{MockNetwork, MockOfferStream, OfferRequest, OfferStreamStats, RenewBehaviour};
pub use outbound::{NetworkInterface, OfferStream, RenewMessage, RenewResponse};

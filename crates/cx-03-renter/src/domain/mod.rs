//! Domain layer for the renter.

pub mod calls;
pub mod config;
pub mod error;
pub mod identity;

pub use calls::{RpcCall, RpcReply};
pub use config::{ConfigError, RenterConfig};
pub use error::{DispatchError, NetworkError, RenewalError, RenterError};
pub use identity::RenterIdentity;

//! Domain layer for the landlord.

pub mod config;
pub mod error;
pub mod pending;
pub mod reliability;

pub use config::{AuthConfig, ConfigError, HttpConfig, LandlordConfig};
pub use error::{AdmissionError, ApiError, LandlordError};
pub use pending::{JobOutcome, JobRegistry, PendingJob};
pub use reliability::{ReliabilityRecorder, ReliabilitySample};

//! Renter configuration with validation.

use cx_01_sharding::{SpanParams, DEFAULT_COVERAGE_PROBABILITY, KEYSPACE_SIZE};
use serde::{Deserialize, Serialize};
use shared_bus::DEFAULT_RESULT_TOPIC;
use shared_types::keys::HARDENED_OFFSET;
use shared_types::{ExtendedPrivateKey, KeyPair};
use thiserror::Error;

/// Main renter configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenterConfig {
    /// Hex extended private key: 32-byte chain code then 32-byte secret
    pub network_private_extended_key: String,
    /// Non-hardened child index of the operating key
    pub network_index: u32,
    /// Legacy key that old contracts were signed with, as 32-byte hex
    pub migration_private_key: Option<String>,
    /// Renters expected in the pool. A pool of one subscribes every
    /// partition; larger pools must keep each renter's range inside the
    /// keyspace or startup fails.
    pub total_renters: u32,
    /// Redundancy multiplier on the subscribed span
    pub renter_overlap: f64,
    /// Probability that any partition is covered by some renter
    pub coverage_probability: f64,
    /// Offers requested per storage offer stream
    pub max_offers: usize,
    /// Recently seen contacts passed to the network as seeds
    pub known_seed_limit: usize,
    /// Topic completions are published on
    pub result_topic: String,
}

impl Default for RenterConfig {
    fn default() -> Self {
        Self {
            network_private_extended_key: String::new(),
            network_index: 0,
            migration_private_key: None,
            total_renters: 1,
            renter_overlap: 1.0,
            coverage_probability: DEFAULT_COVERAGE_PROBABILITY,
            max_offers: 24,
            known_seed_limit: 10,
            result_topic: DEFAULT_RESULT_TOPIC.to_string(),
        }
    }
}

impl RenterConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        ExtendedPrivateKey::from_hex(&self.network_private_extended_key)
            .map_err(|e| ConfigError::InvalidKey(format!("network_private_extended_key: {e}")))?;

        if self.network_index >= HARDENED_OFFSET {
            return Err(ConfigError::HardenedIndex(self.network_index));
        }

        if let Some(key) = &self.migration_private_key {
            KeyPair::from_hex(key)
                .map_err(|e| ConfigError::InvalidKey(format!("migration_private_key: {e}")))?;
        }

        if self.total_renters == 0 {
            return Err(ConfigError::Invalid("total_renters cannot be 0".into()));
        }

        if !(self.renter_overlap.is_finite() && self.renter_overlap > 0.0) {
            return Err(ConfigError::InvalidOverlap(self.renter_overlap));
        }

        if !(self.coverage_probability > 0.0 && self.coverage_probability < 1.0) {
            return Err(ConfigError::InvalidCoverage(self.coverage_probability));
        }

        if self.max_offers == 0 {
            return Err(ConfigError::Invalid("max_offers cannot be 0".into()));
        }

        if self.result_topic.is_empty() {
            return Err(ConfigError::Invalid("result_topic cannot be empty".into()));
        }

        Ok(())
    }

    /// Inputs of the subscription span calculation.
    pub fn span_params(&self) -> SpanParams {
        SpanParams {
            keyspace: KEYSPACE_SIZE,
            pool_size: self.total_renters,
            coverage: self.coverage_probability,
            overlap: self.renter_overlap,
        }
    }
}

impl std::fmt::Debug for RenterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenterConfig")
            .field("network_private_extended_key", &"<redacted>")
            .field("network_index", &self.network_index)
            .field(
                "migration_private_key",
                &self.migration_private_key.as_ref().map(|_| "<redacted>"),
            )
            .field("total_renters", &self.total_renters)
            .field("renter_overlap", &self.renter_overlap)
            .field("coverage_probability", &self.coverage_probability)
            .field("max_offers", &self.max_offers)
            .field("known_seed_limit", &self.known_seed_limit)
            .field("result_topic", &self.result_topic)
            .finish()
    }
}

/// Configuration errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// Key material does not decode
    #[error("invalid key: {0}")]
    InvalidKey(String),
    /// Operating key index in the hardened range
    #[error("network_index {0} is hardened; expected a value below 2^31")]
    HardenedIndex(u32),
    /// Overlap is not a positive finite number
    #[error("invalid renter_overlap: {0}")]
    InvalidOverlap(f64),
    /// Coverage outside (0, 1)
    #[error("invalid coverage_probability: {0}")]
    InvalidCoverage(f64),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

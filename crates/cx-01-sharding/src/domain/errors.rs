//! # Domain Errors
//!
//! Error types for the sharding crate.

use thiserror::Error;

/// Sharding error types.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ShardError {
    /// Queue span inputs outside their domain.
    ///
    /// `keyspace` and `pool_size` must be positive, `coverage` strictly
    /// between 0 and 1.
    #[error("Invalid span input: {0}")]
    InvalidSpanInput(String),

    /// Overlap factor is not a positive finite number.
    #[error("Invalid overlap factor: {0}")]
    InvalidOverlap(f64),

    /// Subscription range leaves the keyspace; ranges are never wrapped
    /// or cut to fit.
    #[error(
        "Partition range {start}..={end} around {center:#04x} (offset {offset}) leaves the keyspace; reduce renter_overlap or grow total_renters"
    )]
    RangeOutOfBounds {
        center: u8,
        offset: u32,
        start: i64,
        end: i64,
    },

    /// Routing key text did not start with a hex byte.
    #[error("Routing key is not hex: {0:?}")]
    InvalidRoutingKey(String),
}

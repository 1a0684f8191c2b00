//! # Value Objects
//!
//! Partition keyspace types. A partition is one byte value; the landlord
//! materialises one work queue per partition.

use crate::domain::errors::ShardError;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Number of partitions (one per leading byte value).
pub const KEYSPACE_SIZE: u32 = 256;

/// Work queue name prefix; the partition byte follows as two hex digits.
pub const QUEUE_PREFIX: &str = "work-x-";

/// Probability that a given partition is covered by at least one renter.
pub const DEFAULT_COVERAGE_PROBABILITY: f64 = 0.999;

/// What a request was routed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingKey {
    /// Hex node id of the target farmer.
    TargetNode(String),
    /// Hex content hash of the shard being placed.
    DataHash(String),
    /// Random byte for requests with no natural key.
    Random(u8),
}

impl RoutingKey {
    /// Leading byte of the key: its partition.
    pub fn partition(&self) -> Result<u8, ShardError> {
        match self {
            Self::TargetNode(text) | Self::DataHash(text) => leading_hex_byte(text),
            Self::Random(byte) => Ok(*byte),
        }
    }
}

fn leading_hex_byte(text: &str) -> Result<u8, ShardError> {
    text.get(..2)
        .and_then(|prefix| u8::from_str_radix(prefix, 16).ok())
        .ok_or_else(|| ShardError::InvalidRoutingKey(text.to_string()))
}

/// Contiguous, inclusive range of partitions a renter subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRange {
    pub start: u8,
    pub end: u8,
}

impl PartitionRange {
    /// Every partition.
    pub fn full() -> Self {
        Self {
            start: 0x00,
            end: 0xff,
        }
    }

    pub fn contains(&self, partition: u8) -> bool {
        (self.start..=self.end).contains(&partition)
    }

    pub fn len(&self) -> usize {
        usize::from(self.end - self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn partitions(&self) -> RangeInclusive<u8> {
        self.start..=self.end
    }
}

/// Inputs of the queue span calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpanParams {
    /// Total partitions `T`.
    pub keyspace: u32,
    /// Renters expected to share the keyspace `Y`.
    pub pool_size: u32,
    /// Target coverage probability `P`, strictly between 0 and 1.
    pub coverage: f64,
    /// Redundancy multiplier on top of the statistical minimum.
    pub overlap: f64,
}

impl Default for SpanParams {
    fn default() -> Self {
        Self {
            keyspace: KEYSPACE_SIZE,
            pool_size: 1,
            coverage: DEFAULT_COVERAGE_PROBABILITY,
            overlap: 1.0,
        }
    }
}

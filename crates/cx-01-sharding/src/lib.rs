//! # CX-01 Sharding
//!
//! Maps RPC requests onto the 256 work queues and computes which slice of
//! those queues a renter must cover.
//!
//! ## Purpose
//!
//! - **Shard Router**: `(method, params) -> routing key -> partition byte ->
//!   "work-x-<hex>"`, used by the landlord to pick an outbound queue
//! - **Queue Span Calculator**: the contiguous partition range a renter
//!   subscribes to so that the pool covers every partition with the
//!   configured probability
//!
//! Both are pure functions; the only non-determinism is the random byte used
//! for methods without a natural key.
//!
//! ## Module Structure
//!
//! ```text
//! cx-01-sharding/
//! ├── domain/          # PartitionRange, RoutingKey, SpanParams, ShardError
//! └── algorithms/      # shard_router, queue_span
//! ```

#![warn(clippy::all)]

pub mod algorithms;
pub mod domain;

// Re-exports
pub use algorithms::{
    partition_range, queue_name, queue_offset, queue_span, routing_key, routing_target,
    RoutingTarget,
};
pub use domain::{
    PartitionRange, RoutingKey, ShardError, SpanParams, DEFAULT_COVERAGE_PROBABILITY,
    KEYSPACE_SIZE, QUEUE_PREFIX,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! # Algorithms
//!
//! - `shard_router`: request to partition and queue name
//! - `queue_span`: renter subscription range

pub mod queue_span;
pub mod shard_router;

pub use queue_span::{partition_range, queue_offset, queue_span};
pub use shard_router::{queue_name, routing_key, routing_target, RoutingTarget};

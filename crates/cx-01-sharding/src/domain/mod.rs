//! # Domain Layer
//!
//! Value objects and errors of the partition keyspace.

pub mod errors;
pub mod value_objects;

pub use errors::ShardError;
pub use value_objects::*;

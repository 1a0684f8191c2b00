//! Cross-crate integration tests.
//!
//! Everything runs in-process: [`shared_bus::InMemoryMessageBus`] stands in
//! for the broker and [`cx_03_renter::MockNetwork`] for the storage network.

pub mod e2e_choreography;
pub mod flows;

#[cfg(test)]
pub(crate) mod fixtures;

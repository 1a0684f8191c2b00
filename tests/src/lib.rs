//! # Complex Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Routing and span math benchmarks
//! └── src/integration/  # Landlord and renter wired over one bus
//!     ├── flows.rs             # Reactor and renter, no HTTP
//!     └── e2e_choreography.rs  # HTTP caller through to the mock network
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p complex-tests
//!
//! # Benchmarks
//! cargo bench -p complex-tests
//! ```

pub mod integration;

//! # Complex Telemetry
//!
//! Observability shared by the landlord and the renters.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` registry with an env filter and a
//!   human-readable or JSON formatter
//! - **Metrics**: Prometheus counters and histograms in one process-wide
//!   registry, exposed by the landlord on `GET /metrics`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use complex_telemetry::{init_tracing, register_metrics, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_tracing(&config)?;
//! register_metrics()?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CX_SERVICE_NAME` | `complex` | Service name attached to logs |
//! | `CX_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `CX_JSON_LOGS` | `false` | JSON formatted logs |

mod config;
mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, LANDLORD_JOBS_ADMITTED,
    LANDLORD_JOBS_COMPLETED, LANDLORD_JOBS_REJECTED, LANDLORD_JOB_DURATION,
    LANDLORD_LATE_RESULTS, RENTER_DISPATCH, RENTER_JOBS_RECEIVED, RENTER_JOBS_REJECTED,
    RENTER_OFFERS, RENTER_RENEWALS,
};
pub use tracing_setup::init_tracing;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Tracing subscriber already initialised")]
    AlreadyInitialised,

    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}


//! CX-02 Landlord - HTTP front door for the renter pool.
//!
//! Accepts storage network RPC requests over HTTP, pushes each onto the work
//! queue of its partition and answers the caller with whatever a renter
//! publishes back, or with a timeout.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       LANDLORD (cx-02)                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  POST /  ──▶ BasicAuth ──▶ envelope check ──▶ ReactorHandle   │
//! │  GET /health, GET /metrics                        │          │
//! │                                                   ▼          │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │ Reactor: JobRegistry, timers, result topic listener    │  │
//! │  └───────────┬────────────────────────────▲───────────────┘  │
//! └──────────────┼────────────────────────────┼──────────────────┘
//!                │ push work-x-NN             │ work.close
//!                ▼                            │
//!                        Message Bus
//! ```
//!
//! # HTTP responses
//!
//! | Status | When |
//! |--------|------|
//! | 200 | renter success envelope, forwarded byte for byte |
//! | 400 | body is not `{id: string, method: string, params: array}` |
//! | 401 | Basic credentials missing or wrong |
//! | 408 | no result within `request_timeout` |
//! | 500 | renter reported an error, or the job could not be queued |
//!
//! Failure bodies are `{"message": ...}`.
//!
//! # Usage
//!
//! ```ignore
//! use cx_02_landlord::{LandlordConfig, LandlordService};
//!
//! let mut landlord = LandlordService::new(LandlordConfig::default(), bus, contacts)?;
//! let addr = landlord.start().await?;
//! ```
//!
//! Results are matched by id against this instance's registry only. Run a
//! single landlord per result topic, or give each instance its own topic.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod domain;
pub mod middleware;
pub mod reactor;
pub mod service;

pub use domain::{
    AdmissionError, ApiError, AuthConfig, ConfigError, HttpConfig, JobOutcome, JobRegistry,
    LandlordConfig, LandlordError, PendingJob, ReliabilityRecorder, ReliabilitySample,
};
pub use reactor::{Reactor, ReactorHandle, ReactorTask};
pub use service::LandlordService;

//! Prometheus metrics for the landlord and renters.
//!
//! All metrics follow the naming convention: `cx_<actor>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry,
    TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // LANDLORD METRICS
    // =========================================================================

    /// Requests that passed admission and were queued
    pub static ref LANDLORD_JOBS_ADMITTED: Counter = Counter::new(
        "cx_landlord_jobs_admitted_total",
        "Total RPC requests admitted and pushed to a work queue"
    ).expect("metric creation failed");

    /// Requests rejected at admission
    pub static ref LANDLORD_JOBS_REJECTED: CounterVec = CounterVec::new(
        Opts::new("cx_landlord_jobs_rejected_total", "Total RPC requests rejected at admission"),
        &["reason"]  // reason: unauthorized/bad_request
    ).expect("metric creation failed");

    /// Jobs resolved, by outcome
    pub static ref LANDLORD_JOBS_COMPLETED: CounterVec = CounterVec::new(
        Opts::new("cx_landlord_jobs_completed_total", "Total jobs resolved"),
        &["outcome"]  // outcome: success/error/timeout
    ).expect("metric creation failed");

    /// Results that arrived for an unknown or already resolved job
    pub static ref LANDLORD_LATE_RESULTS: Counter = Counter::new(
        "cx_landlord_late_results_total",
        "Total results received for jobs that were no longer pending"
    ).expect("metric creation failed");

    /// Time from admission to resolution
    pub static ref LANDLORD_JOB_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "cx_landlord_job_duration_seconds",
            "Time from job admission to result or timeout"
        ).buckets(exponential_buckets(0.01, 2.0, 14).expect("valid buckets"))
    ).expect("metric creation failed");

    // =========================================================================
    // RENTER METRICS
    // =========================================================================

    /// Messages taken off a work queue
    pub static ref RENTER_JOBS_RECEIVED: Counter = Counter::new(
        "cx_renter_jobs_received_total",
        "Total work messages received by renters"
    ).expect("metric creation failed");

    /// Messages rejected before dispatch
    pub static ref RENTER_JOBS_REJECTED: Counter = Counter::new(
        "cx_renter_jobs_rejected_total",
        "Total work messages rejected (malformed or method not allowed)"
    ).expect("metric creation failed");

    /// Dispatched calls by method and outcome
    pub static ref RENTER_DISPATCH: CounterVec = CounterVec::new(
        Opts::new("cx_renter_dispatch_total", "Total dispatched network calls"),
        &["method", "outcome"]  // outcome: success/error
    ).expect("metric creation failed");

    /// Contract renewals attempted, by outcome
    pub static ref RENTER_RENEWALS: CounterVec = CounterVec::new(
        Opts::new("cx_renter_renewals_total", "Total contract renewals attempted"),
        &["outcome"]  // outcome: renewed/failed
    ).expect("metric creation failed");

    /// Storage offers handled, by kind
    pub static ref RENTER_OFFERS: CounterVec = CounterVec::new(
        Opts::new("cx_renter_offers_total", "Total storage offers handled"),
        &["kind"]  // kind: primary/mirror/mirror_failed
    ).expect("metric creation failed");
}

/// Register every metric with [`REGISTRY`].
///
/// Safe to call more than once; metrics already registered are skipped.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Landlord
        Box::new(LANDLORD_JOBS_ADMITTED.clone()),
        Box::new(LANDLORD_JOBS_REJECTED.clone()),
        Box::new(LANDLORD_JOBS_COMPLETED.clone()),
        Box::new(LANDLORD_LATE_RESULTS.clone()),
        Box::new(LANDLORD_JOB_DURATION.clone()),
        // Renter
        Box::new(RENTER_JOBS_RECEIVED.clone()),
        Box::new(RENTER_JOBS_REJECTED.clone()),
        Box::new(RENTER_DISPATCH.clone()),
        Box::new(RENTER_RENEWALS.clone()),
        Box::new(RENTER_OFFERS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

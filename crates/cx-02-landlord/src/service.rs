//! Landlord service.
//!
//! Wires the reactor, the result topic and the HTTP server together.

use crate::domain::{
    AdmissionError, ApiError, JobOutcome, LandlordConfig, LandlordError, ReliabilityRecorder,
};
use crate::middleware::BasicAuthLayer;
use crate::reactor::{Reactor, ReactorHandle, ReactorTask};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use complex_telemetry::{
    encode_metrics, register_metrics, HistogramTimer, LANDLORD_JOBS_REJECTED,
    LANDLORD_JOB_DURATION,
};
use shared_bus::MessageBus;
use shared_types::{ContactStore, WorkRequest};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// The landlord: HTTP ingress in front of the job reactor.
pub struct LandlordService {
    config: LandlordConfig,
    bus: Arc<dyn MessageBus>,
    contacts: Arc<dyn ContactStore>,
    running: Option<Running>,
}

struct Running {
    local_addr: SocketAddr,
    reactor: ReactorTask,
    shutdown_tx: oneshot::Sender<()>,
    server: JoinHandle<()>,
}

impl LandlordService {
    /// Create a new landlord.
    pub fn new(
        config: LandlordConfig,
        bus: Arc<dyn MessageBus>,
        contacts: Arc<dyn ContactStore>,
    ) -> Result<Self, LandlordError> {
        config.validate()?;

        Ok(Self {
            config,
            bus,
            contacts,
            running: None,
        })
    }

    /// Subscribe to results, bind the HTTP listener and start serving.
    ///
    /// Returns the bound address once both are up.
    pub async fn start(&mut self) -> Result<SocketAddr, LandlordError> {
        if let Some(running) = &self.running {
            return Ok(running.local_addr);
        }

        if let Err(e) = register_metrics() {
            warn!(error = %e, "Metrics registration failed");
        }

        let recorder = ReliabilityRecorder::new(
            Arc::clone(&self.contacts),
            self.config.request_timeout,
            self.config.timeout_rate_threshold,
        );
        let (handle, reactor) = Reactor::spawn(
            Arc::clone(&self.bus),
            recorder,
            self.config.request_timeout,
            &self.config.result_topic,
        )
        .await?;

        let listener = match TcpListener::bind(self.config.http_addr()).await {
            Ok(listener) => listener,
            Err(e) => {
                reactor.shutdown().await;
                return Err(LandlordError::Bind(e.to_string()));
            }
        };
        let local_addr = listener
            .local_addr()
            .map_err(|e| LandlordError::Bind(e.to_string()))?;

        let router = build_router(&self.config, handle);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        });

        info!(addr = %local_addr, "Landlord listening");
        self.running = Some(Running {
            local_addr,
            reactor,
            shutdown_tx,
            server,
        });
        Ok(local_addr)
    }

    /// Address the HTTP server is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    /// Stop the HTTP server and the reactor. Pending jobs are dropped.
    pub async fn shutdown(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        info!("Shutting down landlord");
        let _ = running.shutdown_tx.send(());
        running.reactor.shutdown().await;
        if let Err(e) = running.server.await {
            warn!(error = %e, "HTTP server task ended abnormally");
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    reactor: ReactorHandle,
}

fn build_router(config: &LandlordConfig, reactor: ReactorHandle) -> Router {
    let state = AppState { reactor };

    Router::new()
        .route("/", post(handle_rpc))
        .route_layer(BasicAuthLayer::new(config.auth.clone()))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(DefaultBodyLimit::max(config.max_request_size))
        .with_state(state)
}

/// Admit an RPC request and answer with its outcome.
async fn handle_rpc(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match WorkRequest::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "Rejected malformed envelope");
            let err = AdmissionError::BadRequest(e);
            LANDLORD_JOBS_REJECTED
                .with_label_values(&[err.reason()])
                .inc();
            return ApiError::from(err).into_response();
        }
    };

    let _timer = HistogramTimer::new(&LANDLORD_JOB_DURATION);
    match state.reactor.submit(request, body.to_vec()).await {
        Ok(outcome) => outcome_response(outcome),
        Err(_) => ApiError::unavailable().into_response(),
    }
}

fn outcome_response(outcome: JobOutcome) -> Response {
    match outcome {
        JobOutcome::Completed(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        JobOutcome::Failed(message) => ApiError::internal(message).into_response(),
        JobOutcome::TimedOut => ApiError::timeout().into_response(),
        JobOutcome::Rejected(err) => ApiError::from(err).into_response(),
        JobOutcome::Unavailable(message) => ApiError::internal(message).into_response(),
    }
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Response {
    match state.reactor.pending_count().await {
        Ok(pending) => Json(serde_json::json!({
            "status": "healthy",
            "pending_jobs": pending,
            "version": env!("CARGO_PKG_VERSION"),
        }))
        .into_response(),
        Err(_) => ApiError::unavailable().into_response(),
    }
}

/// Prometheus text exposition
async fn metrics() -> Response {
    match encode_metrics() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => ApiError::internal(e.to_string()).into_response(),
    }
}

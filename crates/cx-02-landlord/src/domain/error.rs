//! Landlord error types and their HTTP rendering.
//!
//! Every failure response carries a JSON body `{"message": ...}`.

use crate::domain::config::ConfigError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use shared_bus::BusError;
use shared_types::EnvelopeError;
use thiserror::Error;

/// Reasons a request is refused before a job exists.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdmissionError {
    /// Missing or wrong Basic credentials.
    #[error("Not authorized")]
    Unauthorized,

    /// Body is not a valid `{id, method, params}` envelope.
    #[error("Bad request: {0}")]
    BadRequest(#[from] EnvelopeError),

    /// A job with this id is already pending.
    #[error("Bad request: duplicate request id {0}")]
    DuplicateId(String),
}

impl AdmissionError {
    /// Label used on `cx_landlord_jobs_rejected_total`.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::BadRequest(_) | Self::DuplicateId(_) => "bad_request",
        }
    }
}

/// Service level errors.
#[derive(Debug, Error)]
pub enum LandlordError {
    /// Configuration rejected by `validate`
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Message bus failure
    #[error("message bus error: {0}")]
    Bus(#[from] BusError),

    /// The reactor has stopped
    #[error("shutdown in progress")]
    ShuttingDown,

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

/// An HTTP error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn timeout() -> Self {
        Self::new(StatusCode::REQUEST_TIMEOUT, "Request timed out")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn unavailable() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "Landlord is shutting down")
    }
}

impl From<AdmissionError> for ApiError {
    fn from(err: AdmissionError) -> Self {
        let status = match err {
            AdmissionError::Unauthorized => StatusCode::UNAUTHORIZED,
            AdmissionError::BadRequest(_) | AdmissionError::DuplicateId(_) => {
                StatusCode::BAD_REQUEST
            }
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "message": self.message })),
        )
            .into_response()
    }
}

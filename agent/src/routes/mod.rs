//! API route definitions.
//!
//! This module organizes all HTTP routes for the Outpost agent.

mod health;
mod ingest;
mod stats;

pub use health::{health_routes, HealthResponse};
pub use ingest::{ingest_routes, IngestRequest, IngestResponse, RecordRequest, ValidationErrorDetail};
pub use stats::{stats_routes, StatsResponse};

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};

/// Error body shared by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error type.
    pub error: String,
    /// Detailed error message.
    pub message: String,
    /// Validation errors by index (for batch requests).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ErrorResponse {
    fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn bad_request(error: &str, message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (StatusCode::BAD_REQUEST, Json(Self::new(error, message)))
    }

    fn unknown_signal(signal: &str) -> (StatusCode, Json<Self>) {
        (
            StatusCode::NOT_FOUND,
            Json(Self::new(
                "unknown_signal",
                format!("Unknown signal '{signal}', expected traces, metrics or logs"),
            )),
        )
    }
}

//! Health check endpoint.
//!
//! Provides a health check endpoint for load balancers and monitoring systems.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use shared::models::RecordKind;
use shared::pipeline::PipelineState;
use std::collections::BTreeMap;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" while every enabled pipeline runs, "draining" otherwise.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Lifecycle state of each enabled pipeline.
    pub pipelines: BTreeMap<RecordKind, PipelineState>,
}

/// Creates the health check routes.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
///
/// Returns 200 while the agent accepts telemetry and 503 once any pipeline
/// has begun shutting down.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let pipeline = state.pipeline();
    let pipelines: BTreeMap<_, _> = RecordKind::ALL
        .into_iter()
        .filter(|kind| pipeline.is_enabled(*kind))
        .map(|kind| (kind, pipeline.state(kind)))
        .collect();

    let running = pipelines
        .values()
        .all(|state| *state == PipelineState::Running);
    let (status, label) = if running {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "draining")
    };

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            service: "outpost-agent".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            pipelines,
        }),
    )
}

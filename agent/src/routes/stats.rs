//! Pipeline statistics endpoints.

use super::ErrorResponse;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shared::models::RecordKind;
use shared::pipeline::StatsSnapshot;

/// Statistics for every pipeline.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    /// One snapshot per kind, enabled or not.
    pub pipelines: Vec<StatsSnapshot>,
}

/// Creates the statistics routes.
pub fn stats_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(all_stats))
        .route("/stats/{signal}", get(signal_stats))
}

async fn all_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        pipelines: state.pipeline().snapshot(),
    })
}

async fn signal_stats(
    State(state): State<AppState>,
    Path(signal): Path<String>,
) -> Result<Json<StatsSnapshot>, (StatusCode, Json<ErrorResponse>)> {
    let kind = RecordKind::from_signal(&signal).ok_or_else(|| ErrorResponse::unknown_signal(&signal))?;
    Ok(Json(state.pipeline().stats(kind)))
}

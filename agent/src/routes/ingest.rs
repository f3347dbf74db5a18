//! Record ingestion endpoints.
//!
//! Local producers push spans, metric points and log entries here; accepted
//! records are handed to the export pipeline of the matching kind.

use super::ErrorResponse;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::models::{Attributes, Record, RecordKind};

/// Request body for ingestion - can be a single record or a batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IngestRequest {
    /// A batch of records.
    Batch(Vec<RecordRequest>),
    /// A single record.
    Single(RecordRequest),
}

/// A record as received from a producer.
///
/// The kind comes from the request path; a `kind` field in the body must agree
/// with it.
#[derive(Debug, Deserialize)]
pub struct RecordRequest {
    /// Optional kind, checked against the path.
    #[serde(default)]
    pub kind: Option<RecordKind>,

    /// Trace ID (required for spans).
    #[serde(default)]
    pub trace_id: Option<String>,

    /// Scalar attributes (optional).
    #[serde(default)]
    pub attributes: Attributes,

    /// Timestamp (optional, defaults to current time).
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    /// Kind-specific body.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl RecordRequest {
    /// Builds a record of `kind` from the request.
    #[must_use]
    pub fn into_record(self, kind: RecordKind) -> Record {
        let mut record = Record::new(kind, self.payload).with_attributes(self.attributes);
        if let Some(trace_id) = self.trace_id {
            record = record.with_trace_id(trace_id);
        }
        if let Some(timestamp) = self.timestamp {
            record = record.with_timestamp(timestamp);
        }
        record
    }
}

/// Response for successful ingestion.
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Number of records accepted.
    pub accepted: usize,
    /// Message describing the result.
    pub message: String,
}

/// Validation error detail for a specific record.
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Index in the batch (0 for single requests).
    pub index: usize,
    /// Field that failed validation.
    pub field: String,
    /// Error message.
    pub message: String,
}

/// Creates the ingestion routes.
pub fn ingest_routes() -> Router<AppState> {
    Router::new().route("/v1/{signal}", post(ingest))
}

/// Handler for record ingestion.
///
/// Accepts either a single record or a batch. Returns 202 Accepted once the
/// records are handed to the pipeline, 400 Bad Request if any record is
/// invalid (nothing is emitted then), and 404 for an unknown signal.
async fn ingest(
    State(state): State<AppState>,
    Path(signal): Path<String>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestResponse>), (StatusCode, Json<ErrorResponse>)> {
    let kind =
        RecordKind::from_signal(&signal).ok_or_else(|| ErrorResponse::unknown_signal(&signal))?;

    let Json(request) = payload
        .map_err(|rejection| ErrorResponse::bad_request("invalid_json", rejection.body_text()))?;

    let requests = match request {
        IngestRequest::Single(record) => vec![record],
        IngestRequest::Batch(records) => records,
    };
    if requests.is_empty() {
        return Err(ErrorResponse::bad_request(
            "empty_batch",
            "At least one record is required",
        ));
    }

    let mut validation_errors = Vec::new();
    let mut records = Vec::with_capacity(requests.len());

    for (index, request) in requests.into_iter().enumerate() {
        if let Some(declared) = request.kind.filter(|declared| *declared != kind) {
            validation_errors.push(ValidationErrorDetail {
                index,
                field: "kind".to_string(),
                message: format!("Record kind {declared} does not match /v1/{signal}"),
            });
            continue;
        }

        let record = request.into_record(kind);
        match record.validate_record() {
            Ok(()) => records.push(record),
            // Both validation rules concern the trace ID.
            Err(e) => validation_errors.push(ValidationErrorDetail {
                index,
                field: "trace_id".to_string(),
                message: e.to_string(),
            }),
        }
    }

    if !validation_errors.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "validation_failed".to_string(),
                message: format!("{} record(s) failed validation", validation_errors.len()),
                details: Some(validation_errors),
            }),
        ));
    }

    let count = records.len();
    for record in records {
        state.pipeline().emit(record);
    }
    tracing::debug!(kind = %kind, count, "Accepted records");

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            accepted: count,
            message: format!(
                "Accepted {count} {kind} {}",
                if count == 1 { "record" } else { "records" }
            ),
        }),
    ))
}

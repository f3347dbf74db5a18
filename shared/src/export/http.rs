//! HTTP exporter.
//!
//! Pushes batches as JSON to `<endpoint>/v1/<signal>` and retries transient
//! failures with exponential backoff.

use super::{ExportError, ExportResult, RetryPolicy};
use crate::config::{ConfigError, PipelineConfig};
use crate::models::{Batch, Record, RecordKind, Resource};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Serialize;

/// Longest response body quoted in an error.
const MAX_REASON_LEN: usize = 256;

/// Wire form of one export request.
#[derive(Serialize)]
struct ExportPayload<'a> {
    resource: &'a Resource,
    kind: RecordKind,
    records: &'a [Record],
}

enum AttemptOutcome {
    Delivered,
    Retryable(String),
    Rejected { status: u16, reason: String },
}

/// Sends batches of one kind to the collector.
///
/// Every request carries the configured credential and headers and is bounded
/// by the export timeout. Transport errors, 5xx, 408 and 429 are retried; any
/// other non-success status ends the batch on the first attempt.
#[derive(Debug, Clone)]
pub struct HttpExporter {
    client: reqwest::Client,
    url: String,
    kind: RecordKind,
    resource: Resource,
    retry: RetryPolicy,
}

impl HttpExporter {
    /// Creates an exporter for `kind` from the pipeline configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A configured header or the credential is not a valid header value
    /// - The HTTP client cannot be built
    pub fn new(kind: RecordKind, config: &PipelineConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        for (name, value) in &config.headers {
            let invalid = |reason: String| ConfigError::InvalidHeader {
                name: name.clone(),
                reason,
            };
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
            let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
            headers.insert(header_name, header_value);
        }

        if let Some(credential) = &config.credential {
            let mut value = HeaderValue::from_str(&credential.header_value()).map_err(|e| {
                ConfigError::InvalidHeader {
                    name: AUTHORIZATION.to_string(),
                    reason: e.to_string(),
                }
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.export_timeout())
            .default_headers(headers)
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self {
            client,
            url: config.export_url(kind),
            kind,
            resource: config.resource.clone(),
            retry: config.retry.clone(),
        })
    }

    /// The collector URL this exporter pushes to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The kind of batches this exporter sends.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Sends a batch, retrying transient failures.
    ///
    /// Never panics and never returns an error to the caller: the outcome is
    /// described entirely by the returned [`ExportResult`].
    pub async fn send(&self, batch: &Batch) -> ExportResult {
        let payload = ExportPayload {
            resource: &self.resource,
            kind: batch.kind(),
            records: batch.records(),
        };
        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(err) => {
                return ExportResult::failed(
                    0,
                    ExportError::Permanent {
                        status: None,
                        reason: format!("failed to serialize batch: {err}"),
                    },
                )
            }
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.attempt(body.clone()).await {
                AttemptOutcome::Delivered => return ExportResult::delivered(attempts),
                AttemptOutcome::Rejected { status, reason } => {
                    tracing::warn!(
                        kind = %self.kind,
                        url = %self.url,
                        status,
                        %reason,
                        "Collector rejected batch; check endpoint and credentials"
                    );
                    return ExportResult::failed(
                        attempts,
                        ExportError::Permanent {
                            status: Some(status),
                            reason,
                        },
                    );
                }
                AttemptOutcome::Retryable(reason) => {
                    if attempts > self.retry.max_retries {
                        return ExportResult::failed(
                            attempts,
                            ExportError::Transient { attempts, reason },
                        );
                    }
                    let delay = self.retry.delay_for_retry(attempts);
                    tracing::debug!(
                        kind = %self.kind,
                        attempt = attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        %reason,
                        "Export attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt(&self, body: Vec<u8>) -> AttemptOutcome {
        let response = match self.client.post(&self.url).body(body).send().await {
            Ok(response) => response,
            Err(err) => return AttemptOutcome::Retryable(err.to_string()),
        };

        let status = response.status();
        if status.is_success() {
            return AttemptOutcome::Delivered;
        }

        let reason = response
            .text()
            .await
            .ok()
            .filter(|text| !text.is_empty())
            .map_or_else(
                || status.to_string(),
                |text| text.chars().take(MAX_REASON_LEN).collect(),
            );

        if is_retryable_status(status) {
            AttemptOutcome::Retryable(format!("HTTP {}: {reason}", status.as_u16()))
        } else {
            AttemptOutcome::Rejected {
                status: status.as_u16(),
                reason,
            }
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credential;
    use std::collections::BTreeMap;

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::REQUEST_TIMEOUT));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_exporter_url_per_kind() {
        let config = PipelineConfig::new("http://collector:4318/");
        let exporter = HttpExporter::new(RecordKind::Metric, &config).unwrap();

        assert_eq!(exporter.url(), "http://collector:4318/v1/metrics");
        assert_eq!(exporter.kind(), RecordKind::Metric);
    }

    #[test]
    fn test_exporter_rejects_invalid_credential() {
        let config = PipelineConfig::new("http://collector:4318")
            .with_credential(Credential::Raw("line\nbreak".to_string()));

        let result = HttpExporter::new(RecordKind::Log, &config);
        assert!(matches!(result, Err(ConfigError::InvalidHeader { .. })));
    }

    #[test]
    fn test_exporter_rejects_invalid_header_name() {
        let mut config = PipelineConfig::new("http://collector:4318");
        config.headers = BTreeMap::from([("bad header".to_string(), "v".to_string())]);

        let result = HttpExporter::new(RecordKind::Span, &config);
        assert!(matches!(result, Err(ConfigError::InvalidHeader { name, .. }) if name == "bad header"));
    }
}

//! Pipeline configuration.
//!
//! Defines the per-kind batching settings, collector endpoint, credentials and
//! retry policy consumed by the export pipeline.

use crate::export::RetryPolicy;
use crate::models::{RecordKind, Resource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default collector base URL (OTLP/HTTP port).
pub const DEFAULT_ENDPOINT: &str = "http://localhost:4318";

/// Errors raised while building or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The collector endpoint is not an absolute HTTP(S) URL.
    #[error("Invalid collector endpoint: {0}")]
    InvalidEndpoint(String),

    /// A per-kind setting is out of range.
    #[error("Invalid {kind} pipeline setting: {reason}")]
    InvalidKindSetting {
        /// The pipeline the setting belongs to.
        kind: RecordKind,
        /// What is wrong with it.
        reason: String,
    },

    /// A header name or value cannot be sent over HTTP.
    #[error("Invalid header {name}: {reason}")]
    InvalidHeader {
        /// Header name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A named option has an unrecognized value.
    #[error("Unknown {field} value: {value}")]
    UnknownValue {
        /// The option being parsed.
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// What to do with a record enqueued into a full buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest buffered record to make room.
    #[default]
    DropOldest,
    /// Reject the incoming record.
    DropNewest,
}

impl std::fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DropOldest => write!(f, "drop_oldest"),
            Self::DropNewest => write!(f, "drop_newest"),
        }
    }
}

impl FromStr for OverflowPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop_oldest" => Ok(Self::DropOldest),
            "drop_newest" => Ok(Self::DropNewest),
            other => Err(ConfigError::UnknownValue {
                field: "overflow policy",
                value: other.to_string(),
            }),
        }
    }
}

/// Credential sent in the `Authorization` header of every export.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credential {
    /// Sent as `Bearer <token>`.
    Bearer(String),
    /// Sent verbatim, for collectors that expect a bare API key.
    Raw(String),
}

impl Credential {
    /// The `Authorization` header value.
    #[must_use]
    pub fn header_value(&self) -> String {
        match self {
            Self::Bearer(token) => format!("Bearer {token}"),
            Self::Raw(value) => value.clone(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => write!(f, "Bearer(<redacted>)"),
            Self::Raw(_) => write!(f, "Raw(<redacted>)"),
        }
    }
}

/// Batching settings for one telemetry kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindConfig {
    /// Whether this kind is exported at all.
    pub enabled: bool,
    /// Interval between timer-triggered flushes, in milliseconds.
    pub flush_interval_ms: u64,
    /// Maximum number of records per exported batch.
    pub max_batch_size: usize,
    /// Maximum number of buffered records.
    pub max_queue_size: usize,
}

impl KindConfig {
    /// Returns the flush interval as a `Duration`.
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Validates the settings for `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The flush interval is zero
    /// - The batch size or queue size is zero
    /// - The batch size exceeds the queue size
    pub fn validate(&self, kind: RecordKind) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidKindSetting {
            kind,
            reason: reason.to_string(),
        };
        if self.flush_interval_ms == 0 {
            return Err(invalid("flush interval must be greater than zero"));
        }
        if self.max_batch_size == 0 {
            return Err(invalid("max batch size must be greater than zero"));
        }
        if self.max_queue_size == 0 {
            return Err(invalid("max queue size must be greater than zero"));
        }
        if self.max_batch_size > self.max_queue_size {
            return Err(invalid("max batch size cannot exceed max queue size"));
        }
        Ok(())
    }
}

impl Default for KindConfig {
    /// Returns default batching settings:
    /// - Flush every 1000 ms
    /// - Batches of up to 512 records
    /// - Up to 2048 buffered records
    fn default() -> Self {
        Self {
            enabled: true,
            flush_interval_ms: 1000,
            max_batch_size: 512,
            max_queue_size: 2048,
        }
    }
}

/// Complete configuration of the export pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Collector base URL; kinds are pushed to `<endpoint>/v1/<signal>`.
    pub endpoint: String,
    /// Credential attached to every export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<Credential>,
    /// Extra headers attached to every export.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Resource attached to every batch.
    #[serde(default)]
    pub resource: Resource,
    /// Span pipeline settings.
    pub traces: KindConfig,
    /// Metric pipeline settings.
    pub metrics: KindConfig,
    /// Log pipeline settings.
    pub logs: KindConfig,
    /// Overflow policy shared by all queues.
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,
    /// Retry policy shared by all exporters.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Per-request timeout, in milliseconds.
    pub export_timeout_ms: u64,
}

impl PipelineConfig {
    /// Creates a default configuration pointing at `endpoint`.
    ///
    /// # Examples
    ///
    /// ```
    /// use shared::config::PipelineConfig;
    /// use shared::models::RecordKind;
    ///
    /// let config = PipelineConfig::new("https://collector.example.com:4318/");
    /// assert_eq!(
    ///     config.export_url(RecordKind::Log),
    ///     "https://collector.example.com:4318/v1/logs"
    /// );
    /// ```
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Sets the credential.
    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Sets the resource.
    #[must_use]
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = resource;
        self
    }

    /// Gets the settings for a specific kind.
    #[must_use]
    pub fn kind(&self, kind: RecordKind) -> &KindConfig {
        match kind {
            RecordKind::Span => &self.traces,
            RecordKind::Metric => &self.metrics,
            RecordKind::Log => &self.logs,
        }
    }

    /// Gets mutable settings for a specific kind.
    pub fn kind_mut(&mut self, kind: RecordKind) -> &mut KindConfig {
        match kind {
            RecordKind::Span => &mut self.traces,
            RecordKind::Metric => &mut self.metrics,
            RecordKind::Log => &mut self.logs,
        }
    }

    /// Applies `update` to the settings of every kind.
    pub fn for_each_kind(&mut self, mut update: impl FnMut(&mut KindConfig)) {
        for kind in RecordKind::ALL {
            update(self.kind_mut(kind));
        }
    }

    /// The full collector URL for `kind`.
    #[must_use]
    pub fn export_url(&self, kind: RecordKind) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), kind.export_path())
    }

    /// Returns the export timeout as a `Duration`.
    #[must_use]
    pub fn export_timeout(&self) -> Duration {
        Duration::from_millis(self.export_timeout_ms)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not an HTTP(S) URL or any enabled
    /// kind has invalid settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ConfigError::InvalidEndpoint(self.endpoint.clone()));
        }
        for kind in RecordKind::ALL {
            let settings = self.kind(kind);
            if settings.enabled {
                settings.validate(kind)?;
            }
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            credential: None,
            headers: BTreeMap::new(),
            resource: Resource::default(),
            traces: KindConfig::default(),
            metrics: KindConfig::default(),
            logs: KindConfig::default(),
            overflow_policy: OverflowPolicy::default(),
            retry: RetryPolicy::default(),
            export_timeout_ms: 10_000,
        }
    }
}

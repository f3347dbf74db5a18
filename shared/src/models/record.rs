//! Telemetry record data model.
//!
//! Defines the `Record` structure that flows through the export pipeline: one
//! span, metric point or log record together with its attributes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;
use validator::Validate;

/// The telemetry kind of a record.
///
/// Each kind is exported through its own pipeline and collector path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// A trace span.
    Span,
    /// A metric data point.
    Metric,
    /// A log record.
    Log,
}

impl RecordKind {
    /// All kinds, in pipeline order.
    pub const ALL: [Self; 3] = [Self::Span, Self::Metric, Self::Log];

    /// Returns the collector signal name (`traces`, `metrics` or `logs`).
    #[must_use]
    pub fn signal(self) -> &'static str {
        match self {
            Self::Span => "traces",
            Self::Metric => "metrics",
            Self::Log => "logs",
        }
    }

    /// Returns the collector path records of this kind are pushed to.
    ///
    /// # Example
    ///
    /// ```
    /// use shared::models::RecordKind;
    ///
    /// assert_eq!(RecordKind::Log.export_path(), "/v1/logs");
    /// ```
    #[must_use]
    pub fn export_path(self) -> &'static str {
        match self {
            Self::Span => "/v1/traces",
            Self::Metric => "/v1/metrics",
            Self::Log => "/v1/logs",
        }
    }

    /// Looks up a kind by its collector signal name.
    #[must_use]
    pub fn from_signal(signal: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.signal() == signal)
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Span => write!(f, "span"),
            Self::Metric => write!(f, "metric"),
            Self::Log => write!(f, "log"),
        }
    }
}

/// Error returned when parsing an unknown record kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown record kind: {0}")]
pub struct UnknownRecordKind(pub String);

impl FromStr for RecordKind {
    type Err = UnknownRecordKind;

    /// Accepts both the kind name (`span`) and the signal name (`traces`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "span" | "spans" | "trace" | "traces" => Ok(Self::Span),
            "metric" | "metrics" => Ok(Self::Metric),
            "log" | "logs" => Ok(Self::Log),
            other => Err(UnknownRecordKind(other.to_string())),
        }
    }
}

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A boolean value.
    Bool(bool),
    /// A signed integer value.
    Int(i64),
    /// A floating point value.
    Float(f64),
    /// A string value.
    String(String),
}

impl AttributeValue {
    /// Returns the string value, if this is a string attribute.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Record attributes keyed by attribute name.
pub type Attributes = HashMap<String, AttributeValue>;

/// A single unit of telemetry.
///
/// Records are immutable once handed to the pipeline: the builder methods
/// consume the record and all accessors borrow.
///
/// # Example
///
/// ```
/// use shared::models::{Record, RecordKind};
///
/// let span = Record::span("4bf92f3577b34da6a3ce929d0e0e4736", serde_json::json!({"name": "GET /users"}))
///     .with_attribute("http.method", "GET")
///     .with_attribute("http.status_code", 200);
///
/// assert_eq!(span.kind(), RecordKind::Span);
/// assert!(span.validate_record().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Record {
    kind: RecordKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Trace ID cannot be empty"))]
    trace_id: Option<String>,

    #[serde(default)]
    attributes: Attributes,

    #[serde(default = "Utc::now")]
    timestamp: DateTime<Utc>,

    #[serde(default)]
    payload: serde_json::Value,
}

/// Errors that can occur during record validation.
#[derive(Debug, Error)]
pub enum RecordValidationError {
    /// A span was created without a trace ID.
    #[error("Span records require a trace ID")]
    MissingTraceId,

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

impl Record {
    /// Creates a record of the given kind with the current timestamp.
    #[must_use]
    pub fn new(kind: RecordKind, payload: serde_json::Value) -> Self {
        Self {
            kind,
            trace_id: None,
            attributes: Attributes::new(),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Creates a span record belonging to the given trace.
    #[must_use]
    pub fn span(trace_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::new(RecordKind::Span, payload).with_trace_id(trace_id)
    }

    /// Creates a metric point record.
    #[must_use]
    pub fn metric(payload: serde_json::Value) -> Self {
        Self::new(RecordKind::Metric, payload)
    }

    /// Creates a log record.
    #[must_use]
    pub fn log(payload: serde_json::Value) -> Self {
        Self::new(RecordKind::Log, payload)
    }

    /// Adds an attribute to the record.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Replaces the record's attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Sets the trace ID.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Sets the record timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// The record kind.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// The trace ID, present for spans.
    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// All record attributes.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Looks up a single attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// When the record was produced.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The kind-specific body.
    #[must_use]
    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Validates the record.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A span has no trace ID
    /// - The trace ID is present but empty
    pub fn validate_record(&self) -> Result<(), RecordValidationError> {
        if self.kind == RecordKind::Span && self.trace_id.is_none() {
            return Err(RecordValidationError::MissingTraceId);
        }
        self.validate()?;
        Ok(())
    }
}

//! Batch export to the collector.
//!
//! The [`HttpExporter`] turns a [`Batch`](crate::models::Batch) into one push
//! request and reports the outcome as an [`ExportResult`].

pub mod error;
pub mod http;
pub mod retry;

pub use error::ExportError;
pub use http::HttpExporter;
pub use retry::RetryPolicy;

/// Outcome of exporting one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    /// The collector accepted the batch.
    pub success: bool,
    /// The failure was transient; the batch was dropped only because retries ran out.
    pub retryable: bool,
    /// What went wrong, if anything.
    pub error: Option<ExportError>,
    /// HTTP attempts made, including the first.
    pub attempts: u32,
}

impl ExportResult {
    /// The batch was delivered.
    #[must_use]
    pub fn delivered(attempts: u32) -> Self {
        Self {
            success: true,
            retryable: false,
            error: None,
            attempts,
        }
    }

    /// The batch was dropped because of `error`.
    #[must_use]
    pub fn failed(attempts: u32, error: ExportError) -> Self {
        Self {
            success: false,
            retryable: error.is_retryable(),
            error: Some(error),
            attempts,
        }
    }

    /// The export was cancelled by shutdown.
    #[must_use]
    pub fn abandoned() -> Self {
        Self::failed(0, ExportError::ShutdownTimeout)
    }

    /// Returns true if the export was cancelled by shutdown.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        matches!(self.error, Some(ExportError::ShutdownTimeout))
    }
}

//! Export failure taxonomy.

use thiserror::Error;

/// Reasons telemetry fails to reach the collector.
///
/// None of these ever reach a producer; they end the affected batch and are
/// reported through pipeline statistics and logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    /// The buffer was full and records were discarded by the overflow policy.
    #[error("Buffer full: {dropped} record(s) dropped by overflow policy")]
    OverflowDrop {
        /// Records dropped since the last report.
        dropped: u64,
    },

    /// Network failure or server error that persisted through every retry.
    #[error("Transient export failure after {attempts} attempt(s): {reason}")]
    Transient {
        /// Attempts made before giving up.
        attempts: u32,
        /// Last failure observed.
        reason: String,
    },

    /// The collector refused the batch; retrying cannot help.
    #[error("Permanent export failure{}: {reason}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Permanent {
        /// HTTP status, when the collector answered.
        status: Option<u16>,
        /// Why the batch was refused.
        reason: String,
    },

    /// The export was still running when the shutdown grace period ended.
    #[error("Export abandoned: shutdown timeout elapsed")]
    ShutdownTimeout,
}

impl ExportError {
    /// Returns true if another attempt could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

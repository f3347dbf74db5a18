//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use shared::pipeline::PipelineManager;
use std::sync::Arc;

/// Application state shared across all request handlers.
///
/// Holds the process-wide export pipeline; the agent's composition root
/// creates it once and every handler emits into the same instance.
#[derive(Debug, Clone)]
pub struct AppState {
    pipeline: Arc<PipelineManager>,
}

impl AppState {
    /// Creates a new application state around a running pipeline.
    #[must_use]
    pub fn new(pipeline: Arc<PipelineManager>) -> Self {
        Self { pipeline }
    }

    /// Returns a reference to the export pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &PipelineManager {
        self.pipeline.as_ref()
    }
}

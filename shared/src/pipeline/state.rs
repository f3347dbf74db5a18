//! Pipeline lifecycle state.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of one kind's pipeline.
///
/// Transitions only move forward: `Running` → `Draining` → `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    /// Accepting records and flushing on schedule.
    Running,
    /// Shutdown requested; the final flush is in progress.
    Draining,
    /// Finished; records are rejected.
    Stopped,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Atomically shared [`PipelineState`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: PipelineState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn get(&self) -> PipelineState {
        PipelineState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `state` unless already past it.
    pub(crate) fn advance(&self, state: PipelineState) {
        self.0.fetch_max(state as u8, Ordering::AcqRel);
    }
}

//! Export pipeline supervision.
//!
//! This module wires samplers, queues and exporters into one pipeline per
//! telemetry kind and exposes the producer entry point and graceful shutdown.

pub mod manager;
pub mod state;
pub mod stats;
mod worker;

pub use manager::{PipelineManager, ShutdownResult};
pub use state::PipelineState;
pub use stats::StatsSnapshot;

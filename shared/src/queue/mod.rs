//! Record buffering.
//!
//! Records accepted by the sampler wait here until a size or time trigger
//! drains them into a batch for export.

pub mod batch_queue;

pub use batch_queue::{BatchQueue, EnqueueOutcome};

//! Outpost Shared Library
//!
//! This crate contains the telemetry export pipeline used by the Outpost
//! agent: records flow from producers through a sampler into per-kind bounded
//! queues, and are pushed in batches to a remote collector over HTTP.
//!
//! # Modules
//!
//! - [`models`] - Records, batches and the resource descriptor
//! - [`sampler`] - Keep/drop policies applied before buffering
//! - [`queue`] - Bounded batching buffers
//! - [`export`] - HTTP export with retry and backoff
//! - [`pipeline`] - Per-kind supervision and graceful shutdown
//! - [`config`] - Pipeline configuration
//!
//! # Example
//!
//! ```
//! use shared::models::Record;
//! use shared::sampler::Sampler;
//!
//! let record = Record::span("trace-abc", serde_json::json!({"name": "POST /v1/logs"}))
//!     .with_attribute("http.url", "https://collector:4318/v1/logs");
//!
//! assert!(!Sampler::default().decide(&record).keep);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod export;
pub mod models;
pub mod pipeline;
pub mod queue;
pub mod sampler;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;

//! Configuration module for Outpost.
//!
//! This module contains the configuration structures for the export pipeline.

pub mod pipeline;

pub use pipeline::{ConfigError, Credential, KindConfig, OverflowPolicy, PipelineConfig};

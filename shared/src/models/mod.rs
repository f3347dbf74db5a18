//! Data models for the Outpost export pipeline.
//!
//! This module contains the telemetry record, the export batch and the
//! resource descriptor attached to every export.

pub mod batch;
pub mod record;
pub mod resource;

pub use batch::Batch;
pub use record::{
    AttributeValue, Attributes, Record, RecordKind, RecordValidationError, UnknownRecordKind,
};
pub use resource::Resource;

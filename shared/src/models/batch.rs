//! Export batch model.

use super::record::{Record, RecordKind};

/// An ordered group of records of one kind, exported together.
///
/// A batch is built by draining a queue and cannot be modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    kind: RecordKind,
    records: Vec<Record>,
}

impl Batch {
    /// Creates a batch from records of the given kind.
    #[must_use]
    pub fn new(kind: RecordKind, records: Vec<Record>) -> Self {
        Self { kind, records }
    }

    /// The kind of every record in this batch.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// The records, in insertion order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of records in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the batch holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

//! Per-kind pipeline counters.
//!
//! Every way a record can leave the pipeline is counted here, so operators can
//! account for telemetry that never reached the collector.

use super::state::PipelineState;
use crate::export::{ExportError, ExportResult};
use crate::models::RecordKind;
use crate::queue::BatchQueue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Live counters for one kind.
#[derive(Debug, Default)]
pub(crate) struct PipelineStats {
    received: AtomicU64,
    sampled_out: AtomicU64,
    enqueued: AtomicU64,
    rejected: AtomicU64,
    exported: AtomicU64,
    batches_exported: AtomicU64,
    dropped_transient: AtomicU64,
    dropped_permanent: AtomicU64,
    abandoned: AtomicU64,
    in_flight: AtomicU64,
    last_flush: Mutex<Option<DateTime<Utc>>>,
}

fn bump(counter: &AtomicU64, by: usize) {
    counter.fetch_add(u64::try_from(by).unwrap_or(u64::MAX), Ordering::Relaxed);
}

impl PipelineStats {
    pub(crate) fn record_received(&self) {
        bump(&self.received, 1);
    }

    pub(crate) fn record_sampled_out(&self) {
        bump(&self.sampled_out, 1);
    }

    pub(crate) fn record_enqueued(&self) {
        bump(&self.enqueued, 1);
    }

    pub(crate) fn record_rejected(&self) {
        bump(&self.rejected, 1);
    }

    pub(crate) fn record_abandoned(&self, records: usize) {
        bump(&self.abandoned, records);
    }

    pub(crate) fn begin_export(&self) {
        bump(&self.in_flight, 1);
    }

    /// Classifies a finished export of `records` records.
    pub(crate) fn finish_export(&self, records: usize, result: &ExportResult) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        if result.success {
            bump(&self.exported, records);
            bump(&self.batches_exported, 1);
            return;
        }
        match result.error {
            Some(ExportError::ShutdownTimeout) => bump(&self.abandoned, records),
            Some(ExportError::Transient { .. }) => bump(&self.dropped_transient, records),
            _ => bump(&self.dropped_permanent, records),
        }
    }

    pub(crate) fn mark_flushed(&self) {
        *self.last_flush.lock().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
    }

    pub(crate) fn snapshot(
        &self,
        kind: RecordKind,
        state: PipelineState,
        queue: &BatchQueue,
    ) -> StatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            kind,
            state,
            queued: queue.len(),
            received: load(&self.received),
            sampled_out: load(&self.sampled_out),
            enqueued: load(&self.enqueued),
            rejected: load(&self.rejected),
            dropped_overflow: queue.dropped(),
            exported: load(&self.exported),
            batches_exported: load(&self.batches_exported),
            dropped_transient: load(&self.dropped_transient),
            dropped_permanent: load(&self.dropped_permanent),
            abandoned: load(&self.abandoned),
            in_flight: load(&self.in_flight),
            last_flush: *self.last_flush.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

/// Point-in-time view of one kind's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// The pipeline these counters belong to.
    pub kind: RecordKind,
    /// Lifecycle state.
    pub state: PipelineState,
    /// Records currently buffered.
    pub queued: usize,
    /// Records passed to `emit`.
    pub received: u64,
    /// Records dropped by the sampler.
    pub sampled_out: u64,
    /// Records buffered for export.
    pub enqueued: u64,
    /// Records refused because the pipeline was disabled or shutting down.
    pub rejected: u64,
    /// Records lost to the overflow policy.
    pub dropped_overflow: u64,
    /// Records the collector accepted.
    pub exported: u64,
    /// Batches the collector accepted.
    pub batches_exported: u64,
    /// Records dropped after retries ran out.
    pub dropped_transient: u64,
    /// Records dropped because the collector refused them.
    pub dropped_permanent: u64,
    /// Records abandoned at shutdown.
    pub abandoned: u64,
    /// Exports currently running.
    pub in_flight: u64,
    /// When the last flush finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_flush: Option<DateTime<Utc>>,
}

impl StatsSnapshot {
    /// Records that will never reach the collector.
    #[must_use]
    pub fn lost(&self) -> u64 {
        self.dropped_overflow + self.dropped_transient + self.dropped_permanent + self.abandoned
    }
}

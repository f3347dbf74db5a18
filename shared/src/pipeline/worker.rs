//! Per-kind flush worker.
//!
//! One worker task per enabled kind drains its queue on the flush timer, on a
//! full batch, or on request, and performs the final flush at shutdown.

use super::state::{PipelineState, StateCell};
use super::stats::PipelineStats;
use crate::export::{ExportError, ExportResult, HttpExporter};
use crate::models::{Batch, RecordKind};
use crate::queue::BatchQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Reply channel of a force-flush request; receives whether everything exported.
pub(crate) type FlushRequest = oneshot::Sender<bool>;

pub(crate) struct FlushWorker {
    pub(crate) queue: Arc<BatchQueue>,
    pub(crate) exporter: HttpExporter,
    pub(crate) stats: Arc<PipelineStats>,
    pub(crate) state: Arc<StateCell>,
    pub(crate) flush_interval: Duration,
    /// Ends the flush loop and starts the final drain.
    pub(crate) stop: CancellationToken,
    /// Cancels in-flight and pending exports.
    pub(crate) abort: CancellationToken,
    pub(crate) reported_overflow: u64,
    pub(crate) abandoned_any: bool,
}

impl FlushWorker {
    fn kind(&self) -> RecordKind {
        self.queue.kind()
    }

    /// Runs until stopped; returns true if nothing was abandoned.
    pub(crate) async fn run(mut self, mut requests: mpsc::UnboundedReceiver<FlushRequest>) -> bool {
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.flush_interval, self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = self.stop.cancelled() => break,
                Some(reply) = requests.recv() => {
                    let flushed = self.flush_all().await;
                    // The requester may have given up waiting.
                    let _ = reply.send(flushed);
                }
                () = self.queue.ready() => self.flush_full_batches().await,
                _ = ticker.tick() => {
                    self.flush_all().await;
                }
            }
        }

        self.state.advance(PipelineState::Draining);
        let mut flushed = self.flush_all().await;
        self.state.advance(PipelineState::Stopped);

        // Records that raced past the state check while draining.
        loop {
            let batch = self.queue.drain();
            if batch.is_empty() {
                break;
            }
            self.stats.record_abandoned(batch.len());
            flushed = false;
        }

        let flushed = flushed && !self.abandoned_any;
        tracing::info!(kind = %self.kind(), flushed, "Export pipeline stopped");
        flushed
    }

    /// Exports everything buffered when the flush starts.
    async fn flush_all(&mut self) -> bool {
        let mut remaining = self.queue.len();
        let mut flushed = true;
        while remaining > 0 {
            let batch = self.queue.drain();
            if batch.is_empty() {
                break;
            }
            remaining = remaining.saturating_sub(batch.len());
            flushed &= self.export(batch).await;
        }
        self.report_overflow();
        self.stats.mark_flushed();
        flushed
    }

    /// Exports full batches only, leaving a partial tail for the timer.
    async fn flush_full_batches(&mut self) {
        while self.queue.has_full_batch() && !self.stop.is_cancelled() {
            let batch = self.queue.drain();
            self.export(batch).await;
        }
        self.report_overflow();
    }

    async fn export(&mut self, batch: Batch) -> bool {
        let records = batch.len();
        self.stats.begin_export();
        let result = self
            .abort
            .run_until_cancelled(self.exporter.send(&batch))
            .await
            .unwrap_or_else(ExportResult::abandoned);
        self.stats.finish_export(records, &result);

        if result.success {
            tracing::debug!(
                kind = %self.kind(),
                records,
                attempts = result.attempts,
                "Exported batch"
            );
        } else if result.is_abandoned() {
            self.abandoned_any = true;
            tracing::warn!(kind = %self.kind(), records, "Abandoned export at shutdown");
        } else if let Some(error) = &result.error {
            tracing::warn!(kind = %self.kind(), records, %error, "Dropped batch");
        }
        result.success
    }

    fn report_overflow(&mut self) {
        let dropped = self.queue.dropped();
        if dropped > self.reported_overflow {
            let error = ExportError::OverflowDrop {
                dropped: dropped - self.reported_overflow,
            };
            tracing::warn!(kind = %self.kind(), %error, "Export queue overflowed");
            self.reported_overflow = dropped;
        }
    }
}

//! Pipeline supervision.
//!
//! The `PipelineManager` owns one queue, exporter and flush worker per
//! telemetry kind, routes producer records through the sampler, and performs
//! the bounded-time graceful shutdown.

use super::state::{PipelineState, StateCell};
use super::stats::{PipelineStats, StatsSnapshot};
use super::worker::{FlushRequest, FlushWorker};
use crate::config::{ConfigError, PipelineConfig};
use crate::export::HttpExporter;
use crate::models::{Record, RecordKind};
use crate::queue::{BatchQueue, EnqueueOutcome};
use crate::sampler::Sampler;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex, OnceCell};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Outcome of [`PipelineManager::shutdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownResult {
    /// Kinds whose buffered records were all exported.
    pub flushed: Vec<RecordKind>,
    /// Kinds that lost records to the shutdown deadline or a failed final export.
    pub abandoned: Vec<RecordKind>,
}

impl ShutdownResult {
    /// Returns true if every enabled kind flushed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.abandoned.is_empty()
    }

    /// Returns true if `kind` flushed.
    #[must_use]
    pub fn is_flushed(&self, kind: RecordKind) -> bool {
        self.flushed.contains(&kind)
    }
}

/// Everything the manager keeps for one kind.
struct Lane {
    kind: RecordKind,
    enabled: bool,
    queue: Arc<BatchQueue>,
    stats: Arc<PipelineStats>,
    state: Arc<StateCell>,
    flush_requests: Option<mpsc::UnboundedSender<FlushRequest>>,
}

impl Lane {
    /// Counts records still buffered after the worker exited as abandoned.
    fn abandon_leftovers(&self) -> usize {
        let mut leftover = 0;
        loop {
            let batch = self.queue.drain();
            if batch.is_empty() {
                break;
            }
            leftover += batch.len();
            self.stats.record_abandoned(batch.len());
        }
        if leftover > 0 {
            tracing::warn!(
                kind = %self.kind,
                records = leftover,
                "Abandoned records left after final flush"
            );
        }
        leftover
    }
}

/// A flush worker, kept until it has been joined.
struct WorkerSlot {
    kind: RecordKind,
    handle: JoinHandle<bool>,
    outcome: Option<bool>,
}

/// Cancels in-flight exports if a shutdown call is dropped before its workers
/// were joined.
struct AbortOnDrop<'a> {
    abort: &'a CancellationToken,
    armed: bool,
}

impl AbortOnDrop<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AbortOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!("Shutdown cancelled by caller, abandoning in-flight exports");
            self.abort.cancel();
        }
    }
}

fn lane_index(kind: RecordKind) -> usize {
    match kind {
        RecordKind::Span => 0,
        RecordKind::Metric => 1,
        RecordKind::Log => 2,
    }
}

/// Supervises the span, metric and log pipelines.
///
/// Construct one per process at the composition root and share it by `Arc`.
/// Dropping the manager cancels its workers, abandoning anything still
/// buffered; call [`shutdown`](Self::shutdown) first to flush.
///
/// # Example
///
/// ```no_run
/// use shared::config::PipelineConfig;
/// use shared::models::Record;
/// use shared::pipeline::PipelineManager;
/// use shared::sampler::Sampler;
/// use std::time::Duration;
///
/// # async fn run() -> Result<(), shared::config::ConfigError> {
/// let pipeline = PipelineManager::start(PipelineConfig::default(), Sampler::default())?;
/// pipeline.emit(Record::log(serde_json::json!("service started")));
///
/// let result = pipeline.shutdown(Duration::from_secs(5)).await;
/// assert!(result.is_clean());
/// # Ok(())
/// # }
/// ```
pub struct PipelineManager {
    sampler: Sampler,
    lanes: [Lane; 3],
    /// Held shared by `emit` across its state check and enqueue, and
    /// exclusively while shutdown moves the lanes to draining.
    gate: RwLock<()>,
    workers: Mutex<Vec<WorkerSlot>>,
    stop: CancellationToken,
    abort: CancellationToken,
    shutdown_result: OnceCell<ShutdownResult>,
}

impl PipelineManager {
    /// Validates `config` and starts a flush worker for every enabled kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or an exporter cannot
    /// be built.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start(config: PipelineConfig, sampler: Sampler) -> Result<Self, ConfigError> {
        config.validate()?;

        let stop = CancellationToken::new();
        let abort = CancellationToken::new();
        let mut exporters = Vec::with_capacity(RecordKind::ALL.len());
        for kind in RecordKind::ALL {
            if config.kind(kind).enabled {
                exporters.push((kind, HttpExporter::new(kind, &config)?));
            }
        }

        let mut lanes = RecordKind::ALL.map(|kind| {
            let settings = config.kind(kind);
            Lane {
                kind,
                enabled: settings.enabled,
                queue: Arc::new(BatchQueue::from_config(kind, settings, config.overflow_policy)),
                stats: Arc::new(PipelineStats::default()),
                state: Arc::new(StateCell::new(if settings.enabled {
                    PipelineState::Running
                } else {
                    PipelineState::Stopped
                })),
                flush_requests: None,
            }
        });

        let mut workers = Vec::with_capacity(exporters.len());
        for (kind, exporter) in exporters {
            let lane = &mut lanes[lane_index(kind)];
            let (sender, receiver) = mpsc::unbounded_channel();
            lane.flush_requests = Some(sender);

            tracing::info!(
                kind = %kind,
                url = %exporter.url(),
                flush_interval_ms = config.kind(kind).flush_interval_ms,
                "Starting export pipeline"
            );
            let worker = FlushWorker {
                queue: Arc::clone(&lane.queue),
                exporter,
                stats: Arc::clone(&lane.stats),
                state: Arc::clone(&lane.state),
                flush_interval: config.kind(kind).flush_interval(),
                stop: stop.clone(),
                abort: abort.clone(),
                reported_overflow: 0,
                abandoned_any: false,
            };
            workers.push(WorkerSlot {
                kind,
                handle: tokio::spawn(worker.run(receiver)),
                outcome: None,
            });
        }

        tracing::info!(sampler = %sampler, "Export pipelines started");
        Ok(Self {
            sampler,
            lanes,
            gate: RwLock::new(()),
            workers: Mutex::new(workers),
            stop,
            abort,
            shutdown_result: OnceCell::new(),
        })
    }

    fn lane(&self, kind: RecordKind) -> &Lane {
        &self.lanes[lane_index(kind)]
    }

    /// Hands a record to the pipeline.
    ///
    /// Never waits on I/O and never fails: sampled-out, overflowing and late records
    /// are counted in the kind's statistics.
    pub fn emit(&self, record: Record) {
        let lane = self.lane(record.kind());
        lane.stats.record_received();

        let _gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        if !lane.enabled || lane.state.get() != PipelineState::Running {
            lane.stats.record_rejected();
            return;
        }

        let decision = self.sampler.decide(&record);
        if !decision.keep {
            lane.stats.record_sampled_out();
            return;
        }
        let record = match decision.attributes_override {
            Some(attributes) => record.with_attributes(attributes),
            None => record,
        };

        if lane.queue.enqueue(record) != EnqueueOutcome::Rejected {
            lane.stats.record_enqueued();
        }
    }

    /// Exports everything currently buffered without stopping.
    ///
    /// Returns true if every batch was delivered.
    pub async fn force_flush(&self) -> bool {
        let mut replies = Vec::new();
        for lane in &self.lanes {
            if let Some(sender) = &lane.flush_requests {
                let (reply, receiver) = oneshot::channel();
                if sender.send(reply).is_ok() {
                    replies.push(receiver);
                }
            }
        }

        let mut flushed = true;
        for receiver in replies {
            // A closed channel means the worker already stopped.
            flushed &= receiver.await.unwrap_or(false);
        }
        flushed
    }

    /// Stops all pipelines, flushing what is buffered within `timeout`.
    ///
    /// Exports still running when the timeout elapses are cancelled and their
    /// kinds reported as abandoned. Calling this again returns the first
    /// result without exporting anything. If a call is dropped before it
    /// completes, in-flight exports are abandoned and the next call finishes
    /// joining the workers.
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownResult {
        self.shutdown_result
            .get_or_init(|| self.run_shutdown(timeout))
            .await
            .clone()
    }

    async fn run_shutdown(&self, timeout: Duration) -> ShutdownResult {
        tracing::info!(
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "Shutting down export pipelines"
        );

        let abort_on_cancel = AbortOnDrop {
            abort: &self.abort,
            armed: true,
        };
        {
            let _gate = self.gate.write().unwrap_or_else(PoisonError::into_inner);
            for lane in self.lanes.iter().filter(|lane| lane.enabled) {
                lane.state.advance(PipelineState::Draining);
            }
        }
        self.stop.cancel();

        let mut workers = self.workers.lock().await;
        let deadline = tokio::time::Instant::now() + timeout;
        let mut overdue = 0;

        for slot in workers.iter_mut().filter(|slot| slot.outcome.is_none()) {
            match tokio::time::timeout_at(deadline, &mut slot.handle).await {
                Ok(joined) => slot.outcome = Some(joined.unwrap_or(false)),
                Err(_) => overdue += 1,
            }
        }

        if overdue > 0 {
            tracing::warn!(
                pipelines = overdue,
                "Shutdown timeout elapsed, abandoning in-flight exports"
            );
            self.abort.cancel();
            for slot in workers.iter_mut().filter(|slot| slot.outcome.is_none()) {
                slot.outcome = Some((&mut slot.handle).await.unwrap_or(false));
            }
        }
        abort_on_cancel.disarm();

        let mut result = ShutdownResult::default();
        for slot in &*workers {
            let lane = self.lane(slot.kind);
            lane.state.advance(PipelineState::Stopped);
            let leftover = lane.abandon_leftovers();
            if slot.outcome == Some(true) && leftover == 0 {
                result.flushed.push(slot.kind);
            } else {
                result.abandoned.push(slot.kind);
            }
        }
        result.flushed.sort();
        result.abandoned.sort();

        tracing::info!(
            flushed = ?result.flushed,
            abandoned = ?result.abandoned,
            "Export pipelines stopped"
        );
        result
    }

    /// Lifecycle state of `kind`.
    #[must_use]
    pub fn state(&self, kind: RecordKind) -> PipelineState {
        self.lane(kind).state.get()
    }

    /// Returns true if `kind` is exported at all.
    #[must_use]
    pub fn is_enabled(&self, kind: RecordKind) -> bool {
        self.lane(kind).enabled
    }

    /// Counters for `kind`.
    #[must_use]
    pub fn stats(&self, kind: RecordKind) -> StatsSnapshot {
        let lane = self.lane(kind);
        lane.stats.snapshot(lane.kind, lane.state.get(), &lane.queue)
    }

    /// Counters for every kind.
    #[must_use]
    pub fn snapshot(&self) -> Vec<StatsSnapshot> {
        RecordKind::ALL.into_iter().map(|kind| self.stats(kind)).collect()
    }

    /// The active sampling policy.
    #[must_use]
    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }
}

impl std::fmt::Debug for PipelineManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineManager")
            .field("sampler", &self.sampler)
            .field("states", &RecordKind::ALL.map(|kind| self.state(kind)))
            .finish_non_exhaustive()
    }
}

impl Drop for PipelineManager {
    fn drop(&mut self) {
        self.stop.cancel();
        self.abort.cancel();
    }
}

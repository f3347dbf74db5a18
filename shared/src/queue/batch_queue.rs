//! Bounded batching buffer.
//!
//! Provides the `BatchQueue` that accumulates accepted records for one kind
//! until a flush drains them into a `Batch`.

use crate::config::{KindConfig, OverflowPolicy};
use crate::models::{Batch, Record, RecordKind};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Result of an enqueue call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The record was buffered.
    Accepted,
    /// The record was buffered after evicting the oldest one.
    DisplacedOldest,
    /// The buffer was full and the record was discarded.
    Rejected,
}

/// A bounded, thread-safe record buffer for one telemetry kind.
///
/// Many producers enqueue concurrently; a single flush worker drains. The lock
/// is only held for the push or pop itself, so `enqueue` never waits on I/O.
/// When the buffer is full the configured [`OverflowPolicy`] decides which
/// record is lost, and every loss is counted.
///
/// # Example
///
/// ```
/// use shared::config::OverflowPolicy;
/// use shared::models::{Record, RecordKind};
/// use shared::queue::BatchQueue;
///
/// let queue = BatchQueue::new(RecordKind::Log, 4, 2, OverflowPolicy::DropOldest);
/// for i in 0..3 {
///     queue.enqueue(Record::log(serde_json::json!(i)));
/// }
///
/// assert_eq!(queue.drain().len(), 2);
/// assert_eq!(queue.drain().len(), 1);
/// assert!(queue.drain().is_empty());
/// ```
#[derive(Debug)]
pub struct BatchQueue {
    kind: RecordKind,
    buffer: Mutex<VecDeque<Record>>,
    capacity: usize,
    max_batch_size: usize,
    overflow: OverflowPolicy,
    dropped: AtomicU64,
    ready: Notify,
}

impl BatchQueue {
    /// Creates an empty queue. Zero sizes are raised to one.
    #[must_use]
    pub fn new(
        kind: RecordKind,
        capacity: usize,
        max_batch_size: usize,
        overflow: OverflowPolicy,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            kind,
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            max_batch_size: max_batch_size.max(1),
            overflow,
            dropped: AtomicU64::new(0),
            ready: Notify::new(),
        }
    }

    /// Creates a queue sized from per-kind settings.
    #[must_use]
    pub fn from_config(kind: RecordKind, config: &KindConfig, overflow: OverflowPolicy) -> Self {
        Self::new(kind, config.max_queue_size, config.max_batch_size, overflow)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Record>> {
        // A panicking producer cannot leave the deque half-updated.
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Buffers a record without blocking.
    ///
    /// Wakes the flush worker once a full batch is available.
    pub fn enqueue(&self, record: Record) -> EnqueueOutcome {
        let (outcome, len) = {
            let mut buffer = self.lock();
            let outcome = if buffer.len() < self.capacity {
                buffer.push_back(record);
                EnqueueOutcome::Accepted
            } else {
                match self.overflow {
                    OverflowPolicy::DropOldest => {
                        buffer.pop_front();
                        buffer.push_back(record);
                        EnqueueOutcome::DisplacedOldest
                    }
                    OverflowPolicy::DropNewest => EnqueueOutcome::Rejected,
                }
            };
            (outcome, buffer.len())
        };

        if outcome != EnqueueOutcome::Accepted {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        if outcome != EnqueueOutcome::Rejected && len >= self.max_batch_size {
            self.ready.notify_one();
        }
        outcome
    }

    /// Removes up to `max_batch_size` records, oldest first.
    #[must_use]
    pub fn drain(&self) -> Batch {
        let records: Vec<Record> = {
            let mut buffer = self.lock();
            let count = buffer.len().min(self.max_batch_size);
            buffer.drain(..count).collect()
        };
        Batch::new(self.kind, records)
    }

    /// Waits until a full batch has been signalled.
    ///
    /// A signal raised while nobody is waiting is kept, so a flush worker never
    /// misses a size trigger between two waits.
    pub async fn ready(&self) {
        self.ready.notified().await;
    }

    /// The kind of records held by this queue.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Number of buffered records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no records are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns true if at least one full batch is buffered.
    #[must_use]
    pub fn has_full_batch(&self) -> bool {
        self.len() >= self.max_batch_size
    }

    /// Maximum number of buffered records.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Maximum number of records returned by one drain.
    #[must_use]
    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Total records lost to the overflow policy.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn numbered(i: usize) -> Record {
        Record::log(json!(i))
    }

    fn payloads(batch: &Batch) -> Vec<usize> {
        batch
            .records()
            .iter()
            .map(|r| usize::try_from(r.payload().as_u64().unwrap()).unwrap())
            .collect()
    }

    #[test]
    fn test_drain_returns_records_in_order_exactly_once() {
        let queue = BatchQueue::new(RecordKind::Log, 100, 100, OverflowPolicy::DropOldest);
        for i in 0..50 {
            assert_eq!(queue.enqueue(numbered(i)), EnqueueOutcome::Accepted);
        }

        let batch = queue.drain();

        assert_eq!(payloads(&batch), (0..50).collect::<Vec<_>>());
        assert!(queue.drain().is_empty());
        assert_eq!(queue.dropped(), 0);
    }

    #[test]
    fn test_thousand_records_split_into_512_and_488() {
        let queue = BatchQueue::new(RecordKind::Span, 2048, 512, OverflowPolicy::DropOldest);
        for i in 0..1000 {
            queue.enqueue(numbered(i));
        }

        let first = queue.drain();
        let second = queue.drain();

        assert_eq!(first.len(), 512);
        assert_eq!(second.len(), 488);
        assert_eq!(payloads(&first), (0..512).collect::<Vec<_>>());
        assert_eq!(payloads(&second), (512..1000).collect::<Vec<_>>());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drop_oldest_overflow() {
        let queue = BatchQueue::new(RecordKind::Log, 10, 10, OverflowPolicy::DropOldest);
        let outcomes: Vec<_> = (0..15).map(|i| queue.enqueue(numbered(i))).collect();

        assert_eq!(
            outcomes
                .iter()
                .filter(|o| **o == EnqueueOutcome::DisplacedOldest)
                .count(),
            5
        );
        assert_eq!(queue.dropped(), 5);
        assert_eq!(queue.len(), 10);
        assert_eq!(payloads(&queue.drain()), (5..15).collect::<Vec<_>>());
    }

    #[test]
    fn test_drop_newest_overflow() {
        let queue = BatchQueue::new(RecordKind::Log, 10, 10, OverflowPolicy::DropNewest);
        for i in 0..13 {
            queue.enqueue(numbered(i));
        }

        assert_eq!(queue.dropped(), 3);
        assert_eq!(queue.enqueue(numbered(99)), EnqueueOutcome::Rejected);
        assert_eq!(queue.dropped(), 4);
        assert_eq!(payloads(&queue.drain()), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_concurrent_enqueue_counts_every_overflow() {
        let queue = Arc::new(BatchQueue::new(
            RecordKind::Metric,
            100,
            50,
            OverflowPolicy::DropOldest,
        ));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        queue.enqueue(numbered(t * 1000 + i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.len(), 100);
        assert_eq!(queue.dropped(), 300);
    }

    #[test]
    fn test_zero_sizes_are_clamped() {
        let queue = BatchQueue::new(RecordKind::Log, 0, 0, OverflowPolicy::DropOldest);
        assert_eq!(queue.capacity(), 1);
        assert_eq!(queue.max_batch_size(), 1);
    }

    #[tokio::test]
    async fn test_ready_fires_on_full_batch() {
        let queue = BatchQueue::new(RecordKind::Log, 10, 3, OverflowPolicy::DropOldest);
        for i in 0..3 {
            queue.enqueue(numbered(i));
        }

        tokio::time::timeout(Duration::from_secs(1), queue.ready())
            .await
            .expect("size trigger should be signalled");
        assert!(queue.has_full_batch());
    }

    #[tokio::test]
    async fn test_ready_not_signalled_below_batch_size() {
        let queue = BatchQueue::new(RecordKind::Log, 10, 3, OverflowPolicy::DropOldest);
        queue.enqueue(numbered(0));

        let waited = tokio::time::timeout(Duration::from_millis(50), queue.ready()).await;
        assert!(waited.is_err());
    }
}

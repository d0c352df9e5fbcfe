//! Pending-request batching.
//!
//! Submitted envelopes are parked here until the scheduler tick drains them
//! into the quota buckets. Envelopes are grouped by dedup key so draining is
//! fair across request shapes: each tick releases at most `max_batch_per_key`
//! envelopes per key, FIFO by arrival within a key. Grouping does not
//! deduplicate: two envelopes with the same key are both executed.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;

use crate::circuit_breaker::Admission;
use crate::transport::{Classification, RequestSpec, Response};

/// One pending caller request.
///
/// Created at gateway entry and destroyed once `result_tx` is fulfilled with
/// either a usable response or `None` (terminal failure, exhausted retries,
/// circuit-rejected, or shutdown). The oneshot sender guarantees exactly-once
/// fulfillment.
#[derive(Debug)]
pub struct Envelope {
    /// Unique per envelope, for log correlation.
    pub id: u64,
    /// Query family, selects the quota bucket.
    pub classification: Classification,
    /// Grouping key for fair draining.
    pub dedup_key: String,
    /// Opaque transport descriptor.
    pub spec: RequestSpec,
    /// Free-form caller metadata, used only for logging.
    pub context: String,
    /// How the envelope passed the circuit breaker.
    pub admission: Admission,
    /// When the envelope entered the gateway.
    pub arrived_at: Instant,
    /// Delivers the terminal outcome to the caller.
    pub result_tx: oneshot::Sender<Option<Response>>,
}

/// Dedup-key groups plus a closed flag, guarded by one lock so an enqueue
/// can never slip in between the shutdown drain and the flag becoming
/// visible.
struct PendingGroups {
    by_key: HashMap<String, VecDeque<Envelope>>,
    closed: bool,
}

struct ClassQueue {
    groups: Mutex<PendingGroups>,
    depth: AtomicUsize,
}

impl ClassQueue {
    fn new() -> Self {
        ClassQueue {
            groups: Mutex::new(PendingGroups {
                by_key: HashMap::new(),
                closed: false,
            }),
            depth: AtomicUsize::new(0),
        }
    }
}

/// Per-classification pending queues.
pub struct BatchQueue {
    classes: [ClassQueue; 2],
}

impl BatchQueue {
    pub fn new() -> Self {
        BatchQueue {
            classes: [ClassQueue::new(), ClassQueue::new()],
        }
    }

    /// Parks an envelope until the next scheduler tick. Returns immediately;
    /// nothing executes here.
    ///
    /// Once [`BatchQueue::drain_all`] has run, the queue is closed and the
    /// envelope is handed back so the caller can fail it instead of parking
    /// it where no drain will ever reach it.
    pub async fn enqueue(&self, envelope: Envelope) -> Result<(), Envelope> {
        let queue = &self.classes[envelope.classification.index()];
        let mut groups = queue.groups.lock().await;
        if groups.closed {
            return Err(envelope);
        }
        groups
            .by_key
            .entry(envelope.dedup_key.clone())
            .or_default()
            .push_back(envelope);
        queue.depth.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Removes up to `max_per_key` envelopes from every dedup-key group of
    /// one classification, FIFO within each group.
    pub async fn drain(&self, classification: Classification, max_per_key: usize) -> Vec<Envelope> {
        let queue = &self.classes[classification.index()];
        let mut groups = queue.groups.lock().await;

        let mut drained = Vec::new();
        for group in groups.by_key.values_mut() {
            let take = group.len().min(max_per_key);
            drained.extend(group.drain(..take));
        }
        groups.by_key.retain(|_, group| !group.is_empty());

        queue.depth.fetch_sub(drained.len(), Ordering::SeqCst);
        drained
    }

    /// Removes every pending envelope of every classification and closes the
    /// queue so later enqueues are refused. Used at shutdown to fail pending
    /// callers instead of leaving them hanging.
    pub async fn drain_all(&self) -> Vec<Envelope> {
        let mut drained = Vec::new();
        for queue in &self.classes {
            let mut groups = queue.groups.lock().await;
            groups.closed = true;
            for (_, group) in groups.by_key.drain() {
                drained.extend(group);
            }
            queue.depth.store(0, Ordering::SeqCst);
        }
        drained
    }

    /// Pending envelopes for one classification.
    pub fn depth(&self, classification: Classification) -> usize {
        self.classes[classification.index()]
            .depth
            .load(Ordering::SeqCst)
    }
}

impl Default for BatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

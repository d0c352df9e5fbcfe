//! Gateway statistics tracking.
//!
//! Monotonic counters updated from any task without synchronization beyond
//! atomics. Counters are observability only: nothing in the gateway's
//! correctness depends on them, and they never decrease except through an
//! explicit [`GatewayStats::reset`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use strum::IntoEnumIterator;

use crate::error_handling::FailureKind;

/// Thread-safe counter set for the gateway.
///
/// Shared across the scheduler, retry engine, and breaker via `Arc`. One
/// per-kind failure counter exists for every [`FailureKind`] variant,
/// initialized to zero at construction.
pub struct GatewayStats {
    total_requests: AtomicU64,
    failed_requests: AtomicU64,
    timeout_requests: AtomicU64,
    retry_successes: AtomicU64,
    circuit_rejected: AtomicU64,
    failures_by_kind: HashMap<FailureKind, AtomicU64>,
}

impl GatewayStats {
    pub fn new() -> Self {
        let mut failures_by_kind = HashMap::new();
        for kind in FailureKind::iter() {
            failures_by_kind.insert(kind, AtomicU64::new(0));
        }

        GatewayStats {
            total_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            timeout_requests: AtomicU64::new(0),
            retry_successes: AtomicU64::new(0),
            circuit_rejected: AtomicU64::new(0),
            failures_by_kind,
        }
    }

    /// Records a submit call (including ones the breaker rejects).
    pub fn record_submit(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an envelope that resolved as failure: terminal error,
    /// exhausted retries, or shutdown.
    pub fn record_failed(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one timed-out transport attempt.
    pub fn record_timeout(&self) {
        self.timeout_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a request that succeeded after at least one retry.
    pub fn record_retry_success(&self) {
        self.retry_successes.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a submit rejected by the open circuit breaker.
    pub fn record_circuit_rejected(&self) {
        self.circuit_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one failed transport attempt under its taxonomy kind.
    ///
    /// Never panics when constructed via `new()`: every kind has a counter.
    /// A missing counter indicates an initialization bug, so it is logged and
    /// skipped rather than crashing the gateway.
    pub fn record_failure_kind(&self, kind: FailureKind) {
        if let Some(counter) = self.failures_by_kind.get(&kind) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment failure counter for {kind:?} which is not in the map. \
                 This indicates a bug in GatewayStats initialization."
            );
        }
    }

    /// Count of failed attempts for one kind.
    pub fn failure_kind_count(&self, kind: FailureKind) -> u64 {
        self.failures_by_kind
            .get(&kind)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::SeqCst)
    }

    pub fn failed_requests(&self) -> u64 {
        self.failed_requests.load(Ordering::SeqCst)
    }

    pub fn timeout_requests(&self) -> u64 {
        self.timeout_requests.load(Ordering::SeqCst)
    }

    pub fn retry_successes(&self) -> u64 {
        self.retry_successes.load(Ordering::SeqCst)
    }

    pub fn circuit_rejected(&self) -> u64 {
        self.circuit_rejected.load(Ordering::SeqCst)
    }

    /// Zeroes every counter. Operator-invoked, for test/ops use.
    pub fn reset(&self) {
        self.total_requests.store(0, Ordering::SeqCst);
        self.failed_requests.store(0, Ordering::SeqCst);
        self.timeout_requests.store(0, Ordering::SeqCst);
        self.retry_successes.store(0, Ordering::SeqCst);
        self.circuit_rejected.store(0, Ordering::SeqCst);
        for counter in self.failures_by_kind.values() {
            counter.store(0, Ordering::SeqCst);
        }
    }

    pub(crate) fn failures_snapshot(&self) -> HashMap<FailureKind, u64> {
        FailureKind::iter()
            .map(|kind| (kind, self.failure_kind_count(kind)))
            .collect()
    }
}

impl Default for GatewayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the gateway's counters and gauges.
///
/// Produced by `Gateway::stats()`; reading it never blocks or mutates gateway
/// state.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    /// Submit calls observed, including circuit-rejected ones.
    pub total_requests: u64,
    /// Envelopes that resolved as failure.
    pub failed_requests: u64,
    /// Timed-out transport attempts.
    pub timeout_requests: u64,
    /// Requests that succeeded after at least one retry.
    pub retry_successes: u64,
    /// Submits rejected by the open circuit breaker.
    pub circuit_rejected: u64,
    /// Failed attempts broken down by taxonomy kind.
    pub failures_by_kind: HashMap<FailureKind, u64>,
    /// Pending envelopes in the bulk batch queue.
    pub bulk_queue_depth: usize,
    /// Pending envelopes in the rich batch queue.
    pub rich_queue_depth: usize,
    /// Currently executing bulk requests.
    pub bulk_in_flight: usize,
    /// Currently executing rich requests.
    pub rich_in_flight: usize,
    /// Whether the circuit breaker is open.
    pub circuit_open: bool,
    /// Consecutive terminal failures observed by the breaker.
    pub consecutive_failures: u32,
}

/// Derived health view of the gateway.
#[derive(Debug, Clone)]
pub struct QueueHealth {
    /// Combined verdict: queue depth under threshold, in-flight under
    /// capacity, breaker closed, and consecutive failures below the early
    /// warning line.
    pub healthy: bool,
    /// Combined pending envelopes across both classes.
    pub queue_depth: usize,
    /// Combined in-flight requests across both buckets.
    pub in_flight: usize,
    /// Whether the circuit breaker is open.
    pub circuit_open: bool,
    /// Consecutive terminal failures observed by the breaker.
    pub consecutive_failures: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let stats = GatewayStats::new();
        assert_eq!(stats.total_requests(), 0);
        assert_eq!(stats.failed_requests(), 0);
        assert_eq!(stats.timeout_requests(), 0);
        assert_eq!(stats.retry_successes(), 0);
        assert_eq!(stats.circuit_rejected(), 0);
        for kind in FailureKind::iter() {
            assert_eq!(stats.failure_kind_count(kind), 0);
        }
    }

    #[test]
    fn counters_accumulate() {
        let stats = GatewayStats::new();
        stats.record_submit();
        stats.record_submit();
        stats.record_failed();
        stats.record_timeout();
        stats.record_retry_success();
        stats.record_circuit_rejected();
        stats.record_failure_kind(FailureKind::RateLimited);
        stats.record_failure_kind(FailureKind::RateLimited);

        assert_eq!(stats.total_requests(), 2);
        assert_eq!(stats.failed_requests(), 1);
        assert_eq!(stats.timeout_requests(), 1);
        assert_eq!(stats.retry_successes(), 1);
        assert_eq!(stats.circuit_rejected(), 1);
        assert_eq!(stats.failure_kind_count(FailureKind::RateLimited), 2);
        assert_eq!(stats.failure_kind_count(FailureKind::Network), 0);
    }

    #[test]
    fn reset_zeroes_everything() {
        let stats = GatewayStats::new();
        stats.record_submit();
        stats.record_failed();
        stats.record_failure_kind(FailureKind::ServerError);

        stats.reset();

        assert_eq!(stats.total_requests(), 0);
        assert_eq!(stats.failed_requests(), 0);
        assert_eq!(stats.failure_kind_count(FailureKind::ServerError), 0);
    }

    #[test]
    fn failures_snapshot_covers_all_kinds() {
        let stats = GatewayStats::new();
        stats.record_failure_kind(FailureKind::Timeout);
        let snapshot = stats.failures_snapshot();
        assert_eq!(snapshot.len(), FailureKind::iter().count());
        assert_eq!(snapshot[&FailureKind::Timeout], 1);
    }
}

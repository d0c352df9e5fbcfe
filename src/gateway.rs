//! Gateway entry point and wiring.
//!
//! Flow: `submit` classifies the request and creates an envelope → the batch
//! queue parks it → the scheduler tick drains due envelopes → the quota
//! bucket admits execution under the provider's quota → the retry engine runs
//! it to a terminal outcome → the circuit breaker and stats record it → the
//! envelope's oneshot delivers the result.
//!
//! All state is owned by the constructed instance; nothing is persisted. Two
//! gateways never share buckets, breaker, or counters, so tests can run them
//! side by side.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{interval, Instant};
use tokio_util::sync::CancellationToken;

use crate::batch_queue::{BatchQueue, Envelope};
use crate::circuit_breaker::CircuitBreaker;
use crate::config::{GatewayConfig, QUEUE_DEPTH_WARNING_THRESHOLD};
use crate::error_handling::ConfigError;
use crate::quota_bucket::QuotaBucket;
use crate::retry;
use crate::stats::{GatewayStats, QueueHealth, StatsSnapshot};
use crate::transport::{Classification, RequestSpec, Response, Transport};

struct GatewayInner {
    config: GatewayConfig,
    transport: Arc<dyn Transport>,
    buckets: [QuotaBucket; 2],
    queue: BatchQueue,
    breaker: CircuitBreaker,
    stats: GatewayStats,
    next_id: AtomicU64,
}

impl GatewayInner {
    fn bucket(&self, classification: Classification) -> &QuotaBucket {
        &self.buckets[classification.index()]
    }
}

/// The outbound request gateway.
///
/// Construct one per upstream provider with [`Gateway::new`]; call
/// [`Gateway::shutdown`] when done to stop the background scheduler and
/// refill tasks. Dropping the gateway without shutdown leaves those tasks
/// running until the runtime stops.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use quota_gateway::{Classification, Gateway, GatewayConfig, HttpTransport, RequestSpec};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = Arc::new(HttpTransport::new()?);
/// let gateway = Gateway::new(GatewayConfig::default(), transport)?;
///
/// let spec = RequestSpec::new("GET", "https://provider.example/v1/blocks/42");
/// match gateway.submit(spec, Classification::Bulk, "block sync").await {
///     Some(response) => println!("upstream said: {}", response.body),
///     None => println!("feature temporarily unavailable"),
/// }
///
/// gateway.shutdown();
/// # Ok(())
/// # }
/// ```
pub struct Gateway {
    inner: Arc<GatewayInner>,
    shutdown: CancellationToken,
}

impl Gateway {
    /// Validates `config` and starts the gateway's background tasks.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any configuration section is internally
    /// inconsistent. This is the only error the gateway raises; all runtime
    /// failures surface as `None` from [`Gateway::submit`].
    pub fn new(config: GatewayConfig, transport: Arc<dyn Transport>) -> Result<Self, ConfigError> {
        config.validate()?;

        let shutdown = CancellationToken::new();
        let buckets = [
            QuotaBucket::new("bulk", &config.bulk, shutdown.child_token()),
            QuotaBucket::new("rich", &config.rich, shutdown.child_token()),
        ];

        let breaker = CircuitBreaker::new(&config.breaker);
        let inner = Arc::new(GatewayInner {
            config,
            transport,
            buckets,
            queue: BatchQueue::new(),
            breaker,
            stats: GatewayStats::new(),
            next_id: AtomicU64::new(1),
        });

        spawn_scheduler(Arc::clone(&inner), shutdown.child_token());

        log::info!(
            "Gateway started (bulk: {}/{}ms, rich: {}/{}ms, breaker threshold: {})",
            inner.config.bulk.refill_amount,
            inner.config.bulk.window_ms,
            inner.config.rich.refill_amount,
            inner.config.rich.window_ms,
            inner.config.breaker.failure_threshold
        );

        Ok(Gateway { inner, shutdown })
    }

    /// Submits one request and awaits its terminal outcome.
    ///
    /// Returns the upstream response, or `None` on terminal failure,
    /// exhausted retries, circuit rejection, or shutdown. Retries are
    /// resolved internally; this call never returns an error for expected
    /// failure modes. Once [`Gateway::shutdown`] has been called, submits
    /// resolve immediately as `None`.
    ///
    /// Completion order is not guaranteed to match submission order: a
    /// later-started request can finish before an earlier one that is still
    /// retrying. There is no caller-initiated cancellation; wrap this call in
    /// your own timeout if you need one.
    pub async fn submit(
        &self,
        spec: RequestSpec,
        classification: Classification,
        context: impl Into<String>,
    ) -> Option<Response> {
        let inner = &self.inner;
        inner.stats.record_submit();

        if self.shutdown.is_cancelled() {
            inner.stats.record_failed();
            log::debug!(
                "Gateway shut down, rejecting {} request {}",
                classification.label(),
                spec.dedup_key()
            );
            return None;
        }

        let admission = match inner.breaker.try_pass().await {
            Some(admission) => admission,
            None => {
                inner.stats.record_circuit_rejected();
                log::debug!(
                    "Circuit open, rejecting {} request {}",
                    classification.label(),
                    spec.dedup_key()
                );
                return None;
            }
        };

        let (result_tx, result_rx) = oneshot::channel();
        let envelope = Envelope {
            id: inner.next_id.fetch_add(1, Ordering::Relaxed),
            classification,
            dedup_key: spec.dedup_key(),
            spec,
            context: context.into(),
            admission,
            arrived_at: Instant::now(),
            result_tx,
        };
        // The queue closes when the shutdown drain runs; an envelope refused
        // there is failed the same way the drained ones are.
        if let Err(envelope) = inner.queue.enqueue(envelope).await {
            inner.stats.record_failed();
            let _ = envelope.result_tx.send(None);
        }

        // A dropped sender means the gateway shut down before execution.
        result_rx.await.unwrap_or(None)
    }

    /// Read-only snapshot of counters, gauges, and circuit state.
    pub fn stats(&self) -> StatsSnapshot {
        let inner = &self.inner;
        StatsSnapshot {
            total_requests: inner.stats.total_requests(),
            failed_requests: inner.stats.failed_requests(),
            timeout_requests: inner.stats.timeout_requests(),
            retry_successes: inner.stats.retry_successes(),
            circuit_rejected: inner.stats.circuit_rejected(),
            failures_by_kind: inner.stats.failures_snapshot(),
            bulk_queue_depth: inner.queue.depth(Classification::Bulk),
            rich_queue_depth: inner.queue.depth(Classification::Rich),
            bulk_in_flight: inner.bucket(Classification::Bulk).in_flight(),
            rich_in_flight: inner.bucket(Classification::Rich).in_flight(),
            circuit_open: inner.breaker.is_open(),
            consecutive_failures: inner.breaker.consecutive_failures(),
        }
    }

    /// Derived health verdict: queue depth under threshold, in-flight under
    /// capacity, breaker closed, and consecutive failures below half the
    /// breaker threshold.
    pub fn queue_health(&self) -> QueueHealth {
        let inner = &self.inner;
        let queue_depth = inner.queue.depth(Classification::Bulk)
            + inner.queue.depth(Classification::Rich);
        let bulk_in_flight = inner.bucket(Classification::Bulk).in_flight();
        let rich_in_flight = inner.bucket(Classification::Rich).in_flight();
        let circuit_open = inner.breaker.is_open();
        let consecutive_failures = inner.breaker.consecutive_failures();

        let early_warning = (inner.config.breaker.failure_threshold / 2).max(1);
        let healthy = queue_depth < QUEUE_DEPTH_WARNING_THRESHOLD
            && bulk_in_flight < inner.config.bulk.max_concurrent
            && rich_in_flight < inner.config.rich.max_concurrent
            && !circuit_open
            && consecutive_failures < early_warning;

        QueueHealth {
            healthy,
            queue_depth,
            in_flight: bulk_in_flight + rich_in_flight,
            circuit_open,
            consecutive_failures,
        }
    }

    /// Zeroes all counters. Operator-invoked, for test/ops use.
    pub fn reset_stats(&self) {
        self.inner.stats.reset();
    }

    /// Manually closes the circuit breaker. Operator override for when the
    /// upstream is known to have recovered.
    pub async fn reset_circuit_breaker(&self) {
        self.inner.breaker.reset().await;
    }

    /// Stops the scheduler and refill tasks. Envelopes still queued at
    /// shutdown resolve as `None`, later submits resolve immediately as
    /// `None`, and in-flight executions run to completion.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

fn spawn_scheduler(inner: Arc<GatewayInner>, shutdown: CancellationToken) {
    let tick = Duration::from_millis(inner.config.batch.tick_interval_ms);
    tokio::spawn(async move {
        let mut ticker = interval(tick);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for classification in Classification::ALL {
                        let batch = inner
                            .queue
                            .drain(classification, inner.config.batch.max_batch_per_key)
                            .await;
                        for envelope in batch {
                            tokio::spawn(execute_envelope(Arc::clone(&inner), envelope));
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    let pending = inner.queue.drain_all().await;
                    if !pending.is_empty() {
                        log::warn!(
                            "Gateway shutting down with {} pending requests",
                            pending.len()
                        );
                    }
                    for envelope in pending {
                        inner.stats.record_failed();
                        let _ = envelope.result_tx.send(None);
                    }
                    log::debug!("Gateway scheduler shutting down");
                    break;
                }
            }
        }
    });
}

async fn execute_envelope(inner: Arc<GatewayInner>, envelope: Envelope) {
    log::debug!(
        "Executing {} envelope {} after {}ms in queue",
        envelope.classification.label(),
        envelope.id,
        envelope.arrived_at.elapsed().as_millis()
    );

    let bucket = inner.bucket(envelope.classification);
    let outcome = bucket
        .schedule(retry::execute(
            inner.transport.as_ref(),
            &inner.config.retry,
            &inner.stats,
            &envelope.spec,
            &envelope.context,
        ))
        .await;

    match outcome.response {
        Some(response) => {
            inner.breaker.record_success().await;
            let _ = envelope.result_tx.send(Some(response));
        }
        None => {
            inner.breaker.record_failure(envelope.admission).await;
            inner.stats.record_failed();
            log::warn!(
                "Request {} (envelope {}) failed after {} attempt(s) [{}]",
                envelope.dedup_key,
                envelope.id,
                outcome.attempts,
                envelope.context
            );
            let _ = envelope.result_tx.send(None);
        }
    }
}

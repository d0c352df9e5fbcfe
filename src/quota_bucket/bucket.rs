//! Quota bucket implementation.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, Semaphore};
use tokio::time::{interval_at, sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::BucketConfig;

/// A replenishing allowance of execution permits for one query family.
///
/// [`QuotaBucket::schedule`] guarantees, across all tasks scheduled on one
/// bucket:
/// - at most `refill_amount` tasks start within any refill window,
/// - at most `max_concurrent` tasks execute simultaneously,
/// - consecutive task starts are at least `min_spacing_ms` apart.
///
/// Permits are reset to `refill_amount` by a background task on a fixed
/// wall-clock schedule, independent of demand, so unused permits are never
/// hoarded across windows. Waiting for a permit suspends the caller without
/// affecting other buckets.
pub struct QuotaBucket {
    inner: Arc<BucketInner>,
}

struct BucketInner {
    label: &'static str,
    reservoir: Mutex<u32>,
    refill_amount: u32,
    refilled: Notify,
    concurrency: Semaphore,
    min_spacing: Duration,
    next_start: Mutex<Option<Instant>>,
    in_flight: AtomicUsize,
}

impl QuotaBucket {
    /// Creates a bucket and spawns its refill task.
    ///
    /// The refill task runs until `shutdown` is cancelled. The first refill
    /// lands one full window after construction; until then the bucket serves
    /// its initial `reservoir`.
    pub fn new(label: &'static str, config: &BucketConfig, shutdown: CancellationToken) -> Self {
        let inner = Arc::new(BucketInner {
            label,
            reservoir: Mutex::new(config.reservoir),
            refill_amount: config.refill_amount,
            refilled: Notify::new(),
            concurrency: Semaphore::new(config.max_concurrent),
            min_spacing: Duration::from_millis(config.min_spacing_ms),
            next_start: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
        });

        spawn_refill_task(
            Arc::clone(&inner),
            Duration::from_millis(config.window_ms),
            shutdown,
        );

        QuotaBucket { inner }
    }

    /// Runs `task` under this bucket's quota, concurrency, and spacing
    /// guarantees, suspending until a permit and a concurrency slot are
    /// available.
    pub async fn schedule<F, T>(&self, task: F) -> T
    where
        F: Future<Output = T>,
    {
        // Held for the full task duration; the semaphore is never closed.
        let _slot = self.inner.concurrency.acquire().await.ok();
        self.acquire_permit().await;
        self.wait_for_spacing_slot().await;

        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        let output = task.await;
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        output
    }

    /// Number of tasks currently executing under this bucket.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Permits remaining in the current window. Test/monitoring aid.
    pub async fn available_permits(&self) -> u32 {
        *self.inner.reservoir.lock().await
    }

    async fn acquire_permit(&self) {
        loop {
            {
                let mut reservoir = self.inner.reservoir.lock().await;
                if *reservoir > 0 {
                    *reservoir -= 1;
                    return;
                }
            }

            let refilled = self.inner.refilled.notified();
            tokio::pin!(refilled);
            refilled.as_mut().enable();

            // Re-check after registering: a refill may have landed between
            // the first check and enable(), and notify_waiters only wakes
            // already-registered waiters.
            {
                let mut reservoir = self.inner.reservoir.lock().await;
                if *reservoir > 0 {
                    *reservoir -= 1;
                    return;
                }
            }

            refilled.await;
        }
    }

    /// Reserves the next start slot and sleeps until it arrives.
    ///
    /// Slots are handed out under the lock, so concurrent callers get
    /// distinct, correctly spaced start times; the sleep itself happens
    /// outside the lock.
    async fn wait_for_spacing_slot(&self) {
        if self.inner.min_spacing.is_zero() {
            return;
        }

        let wait = {
            let mut next_start = self.inner.next_start.lock().await;
            let now = Instant::now();
            let start = match *next_start {
                Some(at) if at > now => at,
                _ => now,
            };
            *next_start = Some(start + self.inner.min_spacing);
            start.duration_since(now)
        };

        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

fn spawn_refill_task(inner: Arc<BucketInner>, window: Duration, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + window, window);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    {
                        let mut reservoir = inner.reservoir.lock().await;
                        *reservoir = inner.refill_amount;
                    }
                    inner.refilled.notify_waiters();
                }
                _ = shutdown.cancelled() => {
                    log::debug!("{} bucket refill task shutting down", inner.label);
                    break;
                }
            }
        }
    });
}

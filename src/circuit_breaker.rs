//! Circuit breaker for the upstream provider.
//!
//! Stops hammering an upstream that is clearly down: after N consecutive
//! terminal failures the circuit opens and new submits are rejected outright,
//! consuming neither a retry budget nor a quota permit. Once the cooldown
//! elapses, a bounded number of trial requests probe the upstream; the first
//! success fully closes the circuit, and a trial failure re-opens it and
//! re-arms the cooldown. Failures from requests admitted before the trip
//! (stragglers still in flight when the circuit opened) never touch the
//! cooldown, so they cannot extend the outage window.
//!
//! The breaker is orthogonal to the per-request retry loop: retries happen
//! within one admitted call, the breaker gates whether a new call is admitted
//! at all. It is global to the gateway because provider-side outages affect
//! both query families at once.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::BreakerConfig;

/// How a request was admitted through the breaker.
///
/// The caller carries this tag alongside the request and hands it back to
/// [`CircuitBreaker::record_failure`], which uses it to tell a failed
/// half-open trial apart from a straggler that was admitted before the trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Admitted through a closed circuit.
    Normal,
    /// Admitted as a half-open trial after the cooldown expired.
    Trial,
}

/// Three logical states (closed, open, half-open) stored as an open flag
/// plus counters. Half-open is "open with an expired cooldown": the flag
/// stays set until a trial succeeds.
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    max_half_open_trials: u32,
    consecutive_failures: AtomicU32,
    is_open: AtomicBool,
    half_open_trials_used: AtomicU32,
    opened_at: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(config: &BreakerConfig) -> Self {
        CircuitBreaker {
            failure_threshold: config.failure_threshold,
            cooldown: Duration::from_millis(config.cooldown_ms),
            max_half_open_trials: config.max_half_open_trials,
            consecutive_failures: AtomicU32::new(0),
            is_open: AtomicBool::new(false),
            half_open_trials_used: AtomicU32::new(0),
            opened_at: RwLock::new(None),
        }
    }

    /// Decides whether a new request may pass.
    ///
    /// Closed: always, as [`Admission::Normal`]. Open before cooldown:
    /// never. Open after cooldown: admits up to `max_half_open_trials`
    /// probes as [`Admission::Trial`], then rejects again until a trial
    /// outcome moves the state.
    pub async fn try_pass(&self) -> Option<Admission> {
        if !self.is_open.load(Ordering::SeqCst) {
            return Some(Admission::Normal);
        }

        let opened_at = self.opened_at.read().await;
        match *opened_at {
            Some(opened) if opened.elapsed() >= self.cooldown => {
                let admitted = self
                    .half_open_trials_used
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                        (used < self.max_half_open_trials).then_some(used + 1)
                    })
                    .is_ok();
                if admitted {
                    log::debug!("Circuit breaker: admitting half-open trial request");
                    Some(Admission::Trial)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Records a successful request.
    ///
    /// Resets the consecutive-failure count. Any success while the circuit
    /// is open closes it, whether it came from a half-open trial or from a
    /// straggler admitted before the trip: either way the upstream is
    /// demonstrably answering.
    pub async fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        if self.is_open.load(Ordering::SeqCst) {
            self.is_open.store(false, Ordering::SeqCst);
            self.half_open_trials_used.store(0, Ordering::SeqCst);
            *self.opened_at.write().await = None;
            log::info!("Circuit breaker: circuit closed after successful request");
        }
    }

    /// Records a terminally failed request (exhausted retries or a terminal
    /// error).
    ///
    /// Opens the circuit at the failure threshold. While the circuit is open,
    /// only a failed [`Admission::Trial`] re-arms the cooldown from this
    /// moment; a straggler failure from before the trip leaves the cooldown
    /// running so it cannot extend the outage window.
    pub async fn record_failure(&self, admission: Admission) {
        let count = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;

        if self.is_open.load(Ordering::SeqCst) {
            if admission == Admission::Trial {
                self.half_open_trials_used.store(0, Ordering::SeqCst);
                *self.opened_at.write().await = Some(Instant::now());
                log::warn!("Circuit breaker: trial request failed, circuit re-opened");
            } else {
                log::debug!(
                    "Circuit breaker: straggler failure while open, cooldown unchanged"
                );
            }
            return;
        }

        if count >= self.failure_threshold {
            self.is_open.store(true, Ordering::SeqCst);
            self.half_open_trials_used.store(0, Ordering::SeqCst);
            *self.opened_at.write().await = Some(Instant::now());
            log::error!(
                "Circuit breaker: circuit opened after {} consecutive failures (cooldown: {}ms)",
                count,
                self.cooldown.as_millis()
            );
        }
    }

    /// Manual operator override: closes the circuit and zeroes all counters.
    pub async fn reset(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.is_open.store(false, Ordering::SeqCst);
        self.half_open_trials_used.store(0, Ordering::SeqCst);
        *self.opened_at.write().await = None;
        log::info!("Circuit breaker: manually reset");
    }

    /// Whether the circuit is currently open (for monitoring).
    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::SeqCst)
    }

    /// Current consecutive-failure count (for monitoring).
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }
}

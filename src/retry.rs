//! Classification-aware retry with exponential backoff.
//!
//! Each envelope admitted past the circuit breaker runs through [`execute`]:
//! a bounded number of transport attempts, each under its own growing
//! deadline, with jittered exponential backoff between retryable failures.
//! All retries are resolved internally; the caller only ever sees a usable
//! response or `None`.

use std::time::Duration;

use rand::Rng;
use tokio::time::{sleep, timeout};

use crate::config::RetryConfig;
use crate::error_handling::{retry_schedule, TransportError};
use crate::stats::GatewayStats;
use crate::transport::{RequestSpec, Response, Transport};

/// Terminal outcome of one envelope's retry loop.
pub struct RetryOutcome {
    /// The usable response, or `None` on terminal failure or exhaustion.
    pub response: Option<Response>,
    /// Transport attempts consumed (at least 1).
    pub attempts: u32,
}

/// Deadline for a given attempt: `base_timeout * min(attempt,
/// timeout_growth_cap)`, clamped to the absolute ceiling.
///
/// Upstream latency rises under load; a fixed deadline would time out calls
/// that were about to succeed and the resulting retries would compound the
/// load.
fn attempt_timeout(config: &RetryConfig, attempt: u32) -> Duration {
    let multiplier = attempt.min(config.timeout_growth_cap) as u64;
    let ms = (config.base_timeout_ms.saturating_mul(multiplier)).min(config.timeout_ceiling_ms);
    Duration::from_millis(ms)
}

/// Runs one request to a terminal outcome.
///
/// A timed-out attempt is abandoned: the in-flight transport future is
/// dropped and its result, if it ever materializes, is discarded. Terminal
/// upstream errors resolve after exactly one attempt; retryable failures wait
/// `min(base_delay * 2^(attempt-1) [* penalty] + jitter, delay_cap)` and try
/// again until `max_attempts` is exhausted.
pub async fn execute(
    transport: &dyn Transport,
    config: &RetryConfig,
    stats: &GatewayStats,
    spec: &RequestSpec,
    context: &str,
) -> RetryOutcome {
    let mut backoff = retry_schedule(config);
    let delay_cap = Duration::from_millis(config.delay_cap_ms);
    let mut attempt = 1;

    loop {
        let deadline = attempt_timeout(config, attempt);
        let result = match timeout(deadline, transport.call(spec.clone())).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        };

        let error = match result {
            Ok(response) => {
                if attempt > 1 {
                    stats.record_retry_success();
                    log::debug!(
                        "Request {} succeeded on attempt {attempt} [{context}]",
                        spec.dedup_key()
                    );
                }
                return RetryOutcome {
                    response: Some(response),
                    attempts: attempt,
                };
            }
            Err(error) => error,
        };

        stats.record_failure_kind(error.kind());
        if matches!(error, TransportError::Timeout) {
            stats.record_timeout();
        }

        if !error.is_retryable(config.retry_empty_response) {
            log::debug!(
                "Request {} failed terminally on attempt {attempt}: {error} [{context}]",
                spec.dedup_key()
            );
            return RetryOutcome {
                response: None,
                attempts: attempt,
            };
        }

        if attempt >= config.max_attempts {
            log::warn!(
                "Request {} exhausted {} attempts, last error: {error} [{context}]",
                spec.dedup_key(),
                config.max_attempts
            );
            return RetryOutcome {
                response: None,
                attempts: attempt,
            };
        }

        let mut delay = backoff.next().unwrap_or(delay_cap);
        if matches!(error, TransportError::RateLimited) {
            delay = delay.saturating_mul(config.rate_limit_penalty);
        }
        let jitter = Duration::from_millis(rand::rng().random_range(0..=config.jitter_max_ms));
        let delay = (delay + jitter).min(delay_cap);

        log::debug!(
            "Request {} attempt {attempt} failed ({error}), retrying in {}ms [{context}]",
            spec.dedup_key(),
            delay.as_millis()
        );
        sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Transport that replays a scripted sequence of outcomes, then succeeds.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<Response, TransportError>>>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<Response, TransportError>>) -> Self {
            ScriptedTransport {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for ScriptedTransport {
        fn call(&self, _spec: RequestSpec) -> BoxFuture<'_, Result<Response, TransportError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .script
                .lock()
                .expect("script lock poisoned")
                .pop_front()
                .unwrap_or(Ok(Response {
                    status: 200,
                    body: "ok".into(),
                }));
            Box::pin(async move { next })
        }
    }

    fn fast_retry_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay_ms: 10,
            delay_cap_ms: 50,
            jitter_max_ms: 5,
            rate_limit_penalty: 2,
            base_timeout_ms: 1_000,
            timeout_growth_cap: 3,
            timeout_ceiling_ms: 2_000,
            retry_empty_response: false,
        }
    }

    fn spec() -> RequestSpec {
        RequestSpec::new("getBlock", "42")
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let transport = ScriptedTransport::new(vec![]);
        let stats = GatewayStats::new();
        let outcome = execute(&transport, &fast_retry_config(4), &stats, &spec(), "t").await;

        assert!(outcome.response.is_some());
        assert_eq!(outcome.attempts, 1);
        assert_eq!(transport.calls(), 1);
        assert_eq!(stats.retry_successes(), 0);
    }

    #[tokio::test]
    async fn retryable_failures_then_success() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Network("reset".into())),
            Err(TransportError::Server(503)),
        ]);
        let stats = GatewayStats::new();
        let outcome = execute(&transport, &fast_retry_config(5), &stats, &spec(), "t").await;

        assert!(outcome.response.is_some());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(transport.calls(), 3);
        assert_eq!(stats.retry_successes(), 1);
    }

    #[tokio::test]
    async fn terminal_error_uses_exactly_one_attempt() {
        let transport = ScriptedTransport::new(vec![Err(TransportError::UpstreamTerminal(
            "unsupported method".into(),
        ))]);
        let stats = GatewayStats::new();
        let outcome = execute(&transport, &fast_retry_config(5), &stats, &spec(), "t").await;

        assert!(outcome.response.is_none());
        assert_eq!(outcome.attempts, 1);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn exhaustion_returns_none() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Server(500)),
            Err(TransportError::Server(500)),
            Err(TransportError::Server(500)),
        ]);
        let stats = GatewayStats::new();
        let outcome = execute(&transport, &fast_retry_config(3), &stats, &spec(), "t").await;

        assert!(outcome.response.is_none());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn empty_response_respects_policy() {
        // Default policy: not retried.
        let transport = ScriptedTransport::new(vec![Err(TransportError::EmptyResponse)]);
        let stats = GatewayStats::new();
        let outcome = execute(&transport, &fast_retry_config(4), &stats, &spec(), "t").await;
        assert!(outcome.response.is_none());
        assert_eq!(transport.calls(), 1);

        // Opt-in policy: retried.
        let transport = ScriptedTransport::new(vec![Err(TransportError::EmptyResponse)]);
        let mut config = fast_retry_config(4);
        config.retry_empty_response = true;
        let outcome = execute(&transport, &config, &stats, &spec(), "t").await;
        assert!(outcome.response.is_some());
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn rate_limit_penalty_amplifies_backoff() {
        let config = RetryConfig {
            max_attempts: 2,
            base_delay_ms: 100,
            delay_cap_ms: 10_000,
            jitter_max_ms: 0,
            rate_limit_penalty: 3,
            ..fast_retry_config(2)
        };
        let stats = GatewayStats::new();

        let transport = ScriptedTransport::new(vec![Err(TransportError::RateLimited)]);
        let started = Instant::now();
        let outcome = execute(&transport, &config, &stats, &spec(), "t").await;
        let elapsed = started.elapsed();

        assert!(outcome.response.is_some());
        // base 100ms * penalty 3 = 300ms before the second attempt.
        assert!(
            elapsed >= Duration::from_millis(280),
            "penalized delay too short: {}ms",
            elapsed.as_millis()
        );
    }

    #[tokio::test]
    async fn timeout_counter_tracks_timed_out_attempts() {
        struct HangingTransport;
        impl Transport for HangingTransport {
            fn call(&self, _spec: RequestSpec) -> BoxFuture<'_, Result<Response, TransportError>> {
                Box::pin(async {
                    sleep(Duration::from_secs(60)).await;
                    Err(TransportError::Network("unreachable".into()))
                })
            }
        }

        let config = RetryConfig {
            max_attempts: 2,
            base_delay_ms: 10,
            delay_cap_ms: 20,
            jitter_max_ms: 0,
            base_timeout_ms: 30,
            timeout_growth_cap: 1,
            timeout_ceiling_ms: 30,
            ..fast_retry_config(2)
        };
        let stats = GatewayStats::new();
        let outcome = execute(&HangingTransport, &config, &stats, &spec(), "t").await;

        assert!(outcome.response.is_none());
        assert_eq!(stats.timeout_requests(), 2);
    }

    #[test]
    fn attempt_timeout_grows_then_plateaus() {
        let config = RetryConfig {
            base_timeout_ms: 1_000,
            timeout_growth_cap: 3,
            timeout_ceiling_ms: 10_000,
            ..fast_retry_config(5)
        };
        assert_eq!(attempt_timeout(&config, 1), Duration::from_millis(1_000));
        assert_eq!(attempt_timeout(&config, 2), Duration::from_millis(2_000));
        assert_eq!(attempt_timeout(&config, 3), Duration::from_millis(3_000));
        assert_eq!(attempt_timeout(&config, 4), Duration::from_millis(3_000));
    }

    #[test]
    fn attempt_timeout_respects_ceiling() {
        let config = RetryConfig {
            base_timeout_ms: 8_000,
            timeout_growth_cap: 5,
            timeout_ceiling_ms: 12_000,
            ..fast_retry_config(5)
        };
        assert_eq!(attempt_timeout(&config, 3), Duration::from_millis(12_000));
    }
}

// Shared test helpers: a scripted transport and fast gateway configurations.
//
// This module provides common utilities used across multiple test files to reduce duplication.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::Instant;

use quota_gateway::{GatewayConfig, RequestSpec, Response, Transport, TransportError};

/// Initializes env_logger once per test binary.
#[allow(dead_code)] // Used by other test files
pub fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Transport that replays a scripted sequence of outcomes and records every
/// call. Once the script is exhausted, every call succeeds.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<Response, TransportError>>>,
    calls: AtomicU32,
    starts: Mutex<Vec<Instant>>,
    latency: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<Response, TransportError>>) -> Self {
        ScriptedTransport {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
            starts: Mutex::new(Vec::new()),
            latency: None,
        }
    }

    /// Transport with no scripted failures: every call succeeds.
    #[allow(dead_code)] // Used by other test files
    pub fn always_ok() -> Self {
        Self::new(Vec::new())
    }

    /// Adds a fixed latency to every call.
    #[allow(dead_code)] // Used by other test files
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Instants at which calls started, in call order.
    #[allow(dead_code)] // Used by other test files
    pub fn call_starts(&self) -> Vec<Instant> {
        self.starts.lock().expect("starts lock poisoned").clone()
    }
}

impl Transport for ScriptedTransport {
    fn call(&self, _spec: RequestSpec) -> BoxFuture<'_, Result<Response, TransportError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.starts
            .lock()
            .expect("starts lock poisoned")
            .push(Instant::now());
        let next = self
            .script
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or(Ok(ok_response()));
        let latency = self.latency;
        Box::pin(async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            next
        })
    }
}

pub fn ok_response() -> Response {
    Response {
        status: 200,
        body: r#"{"result":"ok"}"#.to_string(),
    }
}

/// Gateway configuration with generous quotas and millisecond-scale timings,
/// so tests exercise one mechanism at a time without waiting on defaults.
pub fn fast_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();

    config.bulk.reservoir = 50;
    config.bulk.refill_amount = 50;
    config.bulk.window_ms = 1_000;
    config.bulk.max_concurrent = 16;
    config.bulk.min_spacing_ms = 0;

    config.rich.reservoir = 50;
    config.rich.refill_amount = 50;
    config.rich.window_ms = 1_000;
    config.rich.max_concurrent = 16;
    config.rich.min_spacing_ms = 0;

    config.retry.max_attempts = 1;
    config.retry.base_delay_ms = 10;
    config.retry.delay_cap_ms = 50;
    config.retry.jitter_max_ms = 0;
    config.retry.base_timeout_ms = 500;
    config.retry.timeout_growth_cap = 2;
    config.retry.timeout_ceiling_ms = 1_000;

    // Effectively disabled unless a test tightens it.
    config.breaker.failure_threshold = 1_000;
    config.breaker.cooldown_ms = 60_000;
    config.breaker.max_half_open_trials = 1;

    config.batch.tick_interval_ms = 10;
    config.batch.max_batch_per_key = 50;

    config
}

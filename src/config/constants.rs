//! Configuration constants.
//!
//! Default values for the quota buckets, retry engine, circuit breaker, and
//! batch scheduler. All of these can be overridden through [`GatewayConfig`];
//! the constants exist so the defaults are documented in one place.
//!
//! [`GatewayConfig`]: crate::config::GatewayConfig

// Bulk bucket defaults (the provider's "low-level" query family).
/// Permits available in the bulk bucket at startup.
pub const DEFAULT_BULK_RESERVOIR: u32 = 10;
/// Permits restored to the bulk bucket each window.
pub const DEFAULT_BULK_REFILL_AMOUNT: u32 = 10;
/// Bulk bucket refill window in milliseconds.
pub const DEFAULT_BULK_WINDOW_MS: u64 = 1_000;
/// Maximum simultaneous bulk executions.
pub const DEFAULT_BULK_MAX_CONCURRENT: usize = 8;
/// Minimum spacing between consecutive bulk execution starts.
pub const DEFAULT_BULK_MIN_SPACING_MS: u64 = 50;

// Rich bucket defaults (the provider's "high-level" query family).
// The rich quota is roughly half the bulk quota upstream, so the defaults
// mirror that ratio.
/// Permits available in the rich bucket at startup.
pub const DEFAULT_RICH_RESERVOIR: u32 = 5;
/// Permits restored to the rich bucket each window.
pub const DEFAULT_RICH_REFILL_AMOUNT: u32 = 5;
/// Rich bucket refill window in milliseconds.
pub const DEFAULT_RICH_WINDOW_MS: u64 = 1_000;
/// Maximum simultaneous rich executions.
pub const DEFAULT_RICH_MAX_CONCURRENT: usize = 4;
/// Minimum spacing between consecutive rich execution starts.
pub const DEFAULT_RICH_MIN_SPACING_MS: u64 = 100;

// Retry/backoff defaults.
/// Maximum transport attempts per envelope (initial attempt + retries).
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 4;
/// Initial backoff delay in milliseconds. Doubles with each retry.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;
/// Hard ceiling on the backoff delay, applied after jitter and penalties.
pub const DEFAULT_RETRY_DELAY_CAP_MS: u64 = 30_000;
/// Upper bound of the uniform additive jitter window.
pub const DEFAULT_RETRY_JITTER_MAX_MS: u64 = 1_000;
/// Backoff multiplier applied when the upstream explicitly rate-limits us.
pub const DEFAULT_RATE_LIMIT_PENALTY: u32 = 2;
/// Transport timeout for the first attempt.
///
/// Later attempts get `base_timeout * min(attempt, timeout_growth_cap)`:
/// upstream latency tends to rise under load, and a fixed timeout would cause
/// needless retries that compound that load.
pub const DEFAULT_RETRY_BASE_TIMEOUT_MS: u64 = 10_000;
/// Cap on the attempt-number multiplier used for timeout growth.
pub const DEFAULT_RETRY_TIMEOUT_GROWTH_CAP: u32 = 3;
/// Absolute ceiling on any single attempt's timeout.
pub const DEFAULT_RETRY_TIMEOUT_CEILING_MS: u64 = 30_000;

// Circuit breaker defaults.
/// Consecutive terminal failures before the breaker opens.
pub const DEFAULT_BREAKER_FAILURE_THRESHOLD: u32 = 10;
/// Cooldown before half-open trials are admitted, in milliseconds.
pub const DEFAULT_BREAKER_COOLDOWN_MS: u64 = 60_000;
/// Trial requests admitted while half-open before further submits are
/// rejected again.
pub const DEFAULT_BREAKER_MAX_HALF_OPEN_TRIALS: u32 = 3;

// Batch scheduler defaults.
/// Scheduler tick interval in milliseconds.
pub const DEFAULT_BATCH_TICK_INTERVAL_MS: u64 = 75;
/// Maximum envelopes released per dedup key per tick.
pub const DEFAULT_MAX_BATCH_PER_KEY: usize = 25;

// Health reporting.
/// Combined queue depth above which `queue_health()` reports unhealthy.
pub const QUEUE_DEPTH_WARNING_THRESHOLD: usize = 1_000;

// HTTP transport.
/// TCP connection timeout in seconds for the bundled HTTP transport.
pub const TCP_CONNECT_TIMEOUT_SECS: u64 = 5;

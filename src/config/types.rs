//! Configuration types.
//!
//! The gateway is configured once at construction time. Invalid configuration
//! is the only condition that fails synchronously ([`ConfigError`]); every
//! runtime failure is resolved internally and surfaces to callers as `None`.

use serde::{Deserialize, Serialize};

use crate::config::constants::*;
use crate::error_handling::ConfigError;

/// Quota bucket settings for one query classification.
///
/// Each classification (bulk, rich) gets its own independent bucket because
/// the upstream provider enforces separate per-second quotas for its two
/// query families.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Permits available when the bucket is created. Must not exceed
    /// `refill_amount`.
    pub reservoir: u32,
    /// Permits the reservoir is reset to at each window boundary. Refill is
    /// a reset, not an add, so unused permits are never hoarded across
    /// windows.
    pub refill_amount: u32,
    /// Refill window in milliseconds.
    pub window_ms: u64,
    /// Hard cap on simultaneously executing requests.
    pub max_concurrent: usize,
    /// Minimum delay between consecutive execution starts, in milliseconds.
    /// Zero disables spacing.
    pub min_spacing_ms: u64,
}

impl BucketConfig {
    /// Default settings for the bulk (low-level) query family.
    pub fn bulk_defaults() -> Self {
        BucketConfig {
            reservoir: DEFAULT_BULK_RESERVOIR,
            refill_amount: DEFAULT_BULK_REFILL_AMOUNT,
            window_ms: DEFAULT_BULK_WINDOW_MS,
            max_concurrent: DEFAULT_BULK_MAX_CONCURRENT,
            min_spacing_ms: DEFAULT_BULK_MIN_SPACING_MS,
        }
    }

    /// Default settings for the rich (high-level) query family.
    pub fn rich_defaults() -> Self {
        BucketConfig {
            reservoir: DEFAULT_RICH_RESERVOIR,
            refill_amount: DEFAULT_RICH_REFILL_AMOUNT,
            window_ms: DEFAULT_RICH_WINDOW_MS,
            max_concurrent: DEFAULT_RICH_MAX_CONCURRENT,
            min_spacing_ms: DEFAULT_RICH_MIN_SPACING_MS,
        }
    }

    fn validate(&self, label: &str) -> Result<(), ConfigError> {
        if self.refill_amount == 0 {
            return Err(ConfigError::InvalidBucket(format!(
                "{label}: refill_amount must be at least 1"
            )));
        }
        if self.reservoir > self.refill_amount {
            return Err(ConfigError::InvalidBucket(format!(
                "{label}: reservoir ({}) must not exceed refill_amount ({})",
                self.reservoir, self.refill_amount
            )));
        }
        if self.window_ms == 0 {
            return Err(ConfigError::InvalidBucket(format!(
                "{label}: window_ms must be non-zero"
            )));
        }
        if self.max_concurrent == 0 {
            return Err(ConfigError::InvalidBucket(format!(
                "{label}: max_concurrent must be at least 1"
            )));
        }
        Ok(())
    }
}

/// Retry/backoff engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum transport attempts per envelope (initial attempt included).
    pub max_attempts: u32,
    /// Backoff delay before the second attempt, in milliseconds. Doubles with
    /// each subsequent retry. Must be even: the schedule is a doubling series
    /// seeded at 2ms, so an odd base cannot be represented exactly.
    pub base_delay_ms: u64,
    /// Hard ceiling on the backoff delay, applied after jitter and the
    /// rate-limit penalty.
    pub delay_cap_ms: u64,
    /// Upper bound of the uniform additive jitter window, in milliseconds.
    pub jitter_max_ms: u64,
    /// Backoff multiplier applied when the upstream rate-limits us.
    pub rate_limit_penalty: u32,
    /// Transport timeout for the first attempt, in milliseconds.
    pub base_timeout_ms: u64,
    /// Cap on the attempt-number multiplier used for timeout growth.
    pub timeout_growth_cap: u32,
    /// Absolute ceiling on any single attempt's timeout, in milliseconds.
    pub timeout_ceiling_ms: u64,
    /// Whether an empty upstream payload is retried. It is ambiguous whether
    /// retrying helps, so this is a policy knob rather than a fixed rule.
    pub retry_empty_response: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            delay_cap_ms: DEFAULT_RETRY_DELAY_CAP_MS,
            jitter_max_ms: DEFAULT_RETRY_JITTER_MAX_MS,
            rate_limit_penalty: DEFAULT_RATE_LIMIT_PENALTY,
            base_timeout_ms: DEFAULT_RETRY_BASE_TIMEOUT_MS,
            timeout_growth_cap: DEFAULT_RETRY_TIMEOUT_GROWTH_CAP,
            timeout_ceiling_ms: DEFAULT_RETRY_TIMEOUT_CEILING_MS,
            retry_empty_response: false,
        }
    }
}

impl RetryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidRetry(
                "max_attempts must be at least 1".into(),
            ));
        }
        // The backoff schedule is built from a doubling series seeded at 2ms;
        // an odd base would silently floor to the next even value below.
        if self.base_delay_ms < 2 || self.base_delay_ms % 2 != 0 {
            return Err(ConfigError::InvalidRetry(
                "base_delay_ms must be an even value of at least 2".into(),
            ));
        }
        if self.delay_cap_ms < self.base_delay_ms {
            return Err(ConfigError::InvalidRetry(format!(
                "delay_cap_ms ({}) must not be below base_delay_ms ({})",
                self.delay_cap_ms, self.base_delay_ms
            )));
        }
        if self.rate_limit_penalty == 0 {
            return Err(ConfigError::InvalidRetry(
                "rate_limit_penalty must be at least 1".into(),
            ));
        }
        if self.base_timeout_ms == 0 {
            return Err(ConfigError::InvalidRetry(
                "base_timeout_ms must be non-zero".into(),
            ));
        }
        if self.timeout_growth_cap == 0 {
            return Err(ConfigError::InvalidRetry(
                "timeout_growth_cap must be at least 1".into(),
            ));
        }
        if self.timeout_ceiling_ms < self.base_timeout_ms {
            return Err(ConfigError::InvalidRetry(format!(
                "timeout_ceiling_ms ({}) must not be below base_timeout_ms ({})",
                self.timeout_ceiling_ms, self.base_timeout_ms
            )));
        }
        Ok(())
    }
}

/// Circuit breaker settings.
///
/// The breaker is global to the gateway: provider-side outages typically
/// affect both query families at once, so both classifications feed one
/// breaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive terminal failures before the breaker opens.
    pub failure_threshold: u32,
    /// Cooldown after opening before half-open trials are admitted, in
    /// milliseconds.
    pub cooldown_ms: u64,
    /// Trial requests admitted per half-open window.
    pub max_half_open_trials: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfig {
            failure_threshold: DEFAULT_BREAKER_FAILURE_THRESHOLD,
            cooldown_ms: DEFAULT_BREAKER_COOLDOWN_MS,
            max_half_open_trials: DEFAULT_BREAKER_MAX_HALF_OPEN_TRIALS,
        }
    }
}

impl BreakerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::InvalidBreaker(
                "failure_threshold must be at least 1".into(),
            ));
        }
        if self.cooldown_ms == 0 {
            return Err(ConfigError::InvalidBreaker(
                "cooldown_ms must be non-zero".into(),
            ));
        }
        if self.max_half_open_trials == 0 {
            return Err(ConfigError::InvalidBreaker(
                "max_half_open_trials must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Batch scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Interval between scheduler ticks, in milliseconds.
    pub tick_interval_ms: u64,
    /// Maximum envelopes released per dedup key per tick.
    pub max_batch_per_key: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            tick_interval_ms: DEFAULT_BATCH_TICK_INTERVAL_MS,
            max_batch_per_key: DEFAULT_MAX_BATCH_PER_KEY,
        }
    }
}

impl BatchConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidBatch(
                "tick_interval_ms must be non-zero".into(),
            ));
        }
        if self.max_batch_per_key == 0 {
            return Err(ConfigError::InvalidBatch(
                "max_batch_per_key must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Complete gateway configuration.
///
/// # Examples
///
/// ```
/// use quota_gateway::GatewayConfig;
///
/// let mut config = GatewayConfig::default();
/// config.retry.max_attempts = 5;
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Quota bucket for the bulk query family.
    pub bulk: BucketConfig,
    /// Quota bucket for the rich query family.
    pub rich: BucketConfig,
    /// Retry/backoff engine settings.
    pub retry: RetryConfig,
    /// Circuit breaker settings.
    pub breaker: BreakerConfig,
    /// Batch scheduler settings.
    pub batch: BatchConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            bulk: BucketConfig::bulk_defaults(),
            rich: BucketConfig::rich_defaults(),
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Checks every section for internally consistent values.
    ///
    /// Called by `Gateway::new`; exposed so callers can validate configuration
    /// loaded from external sources before constructing anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bulk.validate("bulk")?;
        self.rich.validate("rich")?;
        self.retry.validate()?;
        self.breaker.validate()?;
        self.batch.validate()?;
        Ok(())
    }
}

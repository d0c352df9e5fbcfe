//! Gateway configuration and constants.
//!
//! This module provides:
//! - Configuration constants (quotas, timeouts, thresholds)
//! - Configuration structs for each gateway component, with validation

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{BatchConfig, BreakerConfig, BucketConfig, GatewayConfig, RetryConfig};

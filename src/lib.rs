//! quota_gateway: adaptive rate-limited outbound request gateway
//!
//! This library shields a process from an upstream data provider that
//! enforces hard per-second request quotas, with separate quotas for its
//! bulk (low-level) and rich (high-level) query families. It absorbs
//! transient upstream failures, rate-limit rejections, and timeouts without
//! overwhelming the provider or starving callers.
//!
//! The gateway wraps an external [`Transport`] and layers on top of it:
//! - per-class quota buckets (reservoir, concurrency cap, minimum spacing)
//! - fair batching of pending requests, grouped by dedup key
//! - classification-aware retry with jittered exponential backoff
//! - a global circuit breaker with half-open recovery trials
//! - monotonic stats and a derived health verdict
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use quota_gateway::{Classification, Gateway, GatewayConfig, HttpTransport, RequestSpec};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(HttpTransport::new()?);
//! let gateway = Gateway::new(GatewayConfig::default(), transport)?;
//!
//! let spec = RequestSpec::new("GET", "https://provider.example/v1/accounts/abc");
//! let response = gateway.submit(spec, Classification::Rich, "balance lookup").await;
//! // None means "feature temporarily unavailable", never a crash.
//!
//! gateway.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your
//! application or ensure you're calling library functions within an async
//! context.

#![warn(missing_docs)]

mod batch_queue;
mod circuit_breaker;
pub mod config;
mod error_handling;
mod gateway;
mod quota_bucket;
mod retry;
mod stats;
mod transport;

// Re-export public API
pub use config::{BatchConfig, BreakerConfig, BucketConfig, GatewayConfig, RetryConfig};
pub use error_handling::{ConfigError, FailureKind, InitializationError, TransportError};
pub use gateway::Gateway;
pub use stats::{QueueHealth, StatsSnapshot};
pub use transport::{Classification, HttpTransport, RequestSpec, Response, Transport};

//! Failure classification and backoff strategy.
//!
//! This module provides:
//! - The closed failure taxonomy ([`TransportError`], [`FailureKind`])
//! - Construction-time configuration errors ([`ConfigError`])
//! - reqwest error categorization for the bundled HTTP transport
//! - The exponential backoff schedule used by the retry engine
//!
//! Classification happens exactly once, at the transport boundary; the retry
//! engine and circuit breaker only ever see taxonomy variants.

mod categorization;
mod types;

// Re-export public API
pub use categorization::{categorize_reqwest_error, retry_schedule};
pub use types::{ConfigError, FailureKind, InitializationError, TransportError};

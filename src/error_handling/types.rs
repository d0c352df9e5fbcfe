//! Error type definitions.
//!
//! Failures are classified exactly once, at the transport boundary, into the
//! closed [`TransportError`] set. Everything downstream (the retry engine, the
//! circuit breaker, the stats reporter) operates on these variants rather
//! than re-inspecting response shapes.

use reqwest::Error as ReqwestError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error returned synchronously when a gateway is constructed with invalid
/// configuration.
///
/// This is the only error the gateway ever raises past its boundary; all
/// runtime failures resolve to `None` at the submit call.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A quota bucket section is internally inconsistent.
    #[error("invalid bucket configuration: {0}")]
    InvalidBucket(String),

    /// The retry/backoff section is internally inconsistent.
    #[error("invalid retry configuration: {0}")]
    InvalidRetry(String),

    /// The circuit breaker section is internally inconsistent.
    #[error("invalid circuit breaker configuration: {0}")]
    InvalidBreaker(String),

    /// The batch scheduler section is internally inconsistent.
    #[error("invalid batch configuration: {0}")]
    InvalidBatch(String),
}

/// Error types for HTTP transport initialization failures.
#[derive(Error, Debug)]
pub enum InitializationError {
    /// Error building the underlying HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),
}

/// A classified transport failure.
///
/// Produced by [`Transport`] implementations (or by the retry engine itself
/// for attempt timeouts) and consumed by the retry engine to decide
/// retryability.
///
/// [`Transport`]: crate::transport::Transport
#[derive(Error, Debug)]
pub enum TransportError {
    /// The attempt exceeded its deadline. The in-flight call is abandoned; a
    /// late result, if any, is discarded.
    #[error("transport attempt timed out")]
    Timeout,

    /// Network-level failure: connection reset, DNS failure, connection
    /// refused, and similar.
    #[error("network failure: {0}")]
    Network(String),

    /// The upstream explicitly signaled over-quota (HTTP 429).
    #[error("rate limited by upstream")]
    RateLimited,

    /// Upstream internal failure (HTTP 5xx).
    #[error("upstream server error (status {0})")]
    Server(u16),

    /// An upstream-reported application error known to be transient, such as
    /// a lookup against data not yet indexed.
    #[error("retryable upstream error: {0}")]
    UpstreamRetryable(String),

    /// An upstream-reported application error that retrying cannot fix:
    /// malformed request, unsupported method, and similar.
    #[error("terminal upstream error: {0}")]
    UpstreamTerminal(String),

    /// The transport succeeded but the payload was unusable (empty body).
    #[error("upstream returned no usable payload")]
    EmptyResponse,
}

impl TransportError {
    /// Maps the error to its stats-counter kind.
    pub fn kind(&self) -> FailureKind {
        match self {
            TransportError::Timeout => FailureKind::Timeout,
            TransportError::Network(_) => FailureKind::Network,
            TransportError::RateLimited => FailureKind::RateLimited,
            TransportError::Server(_) => FailureKind::ServerError,
            TransportError::UpstreamRetryable(_) => FailureKind::UpstreamRetryable,
            TransportError::UpstreamTerminal(_) => FailureKind::UpstreamTerminal,
            TransportError::EmptyResponse => FailureKind::EmptyResponse,
        }
    }

    /// Whether the retry engine may attempt this request again.
    ///
    /// `retry_empty_response` is the configurable policy for
    /// [`TransportError::EmptyResponse`]: it is ambiguous whether a retry
    /// helps there, so the decision belongs to the operator.
    pub fn is_retryable(&self, retry_empty_response: bool) -> bool {
        match self {
            TransportError::Timeout
            | TransportError::Network(_)
            | TransportError::RateLimited
            | TransportError::Server(_)
            | TransportError::UpstreamRetryable(_) => true,
            TransportError::UpstreamTerminal(_) => false,
            TransportError::EmptyResponse => retry_empty_response,
        }
    }
}

/// Failure kinds tracked by the stats reporter.
///
/// One counter exists per variant; counters are monotonic and observability
/// only, never authoritative for correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum FailureKind {
    /// Attempt deadline exceeded.
    Timeout,
    /// Network-level failure.
    Network,
    /// Upstream rate-limit rejection.
    RateLimited,
    /// Upstream 5xx.
    ServerError,
    /// Transient upstream application error.
    UpstreamRetryable,
    /// Terminal upstream application error.
    UpstreamTerminal,
    /// Transport succeeded with no usable payload.
    EmptyResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_errors_are_never_retryable() {
        let err = TransportError::UpstreamTerminal("unsupported method".into());
        assert!(!err.is_retryable(false));
        assert!(!err.is_retryable(true));
    }

    #[test]
    fn network_class_errors_are_always_retryable() {
        for err in [
            TransportError::Timeout,
            TransportError::Network("connection reset".into()),
            TransportError::RateLimited,
            TransportError::Server(503),
            TransportError::UpstreamRetryable("not yet indexed".into()),
        ] {
            assert!(err.is_retryable(false), "{err} should be retryable");
        }
    }

    #[test]
    fn empty_response_retryability_is_a_policy_decision() {
        assert!(!TransportError::EmptyResponse.is_retryable(false));
        assert!(TransportError::EmptyResponse.is_retryable(true));
    }

    #[test]
    fn kind_maps_every_variant() {
        assert_eq!(TransportError::Timeout.kind(), FailureKind::Timeout);
        assert_eq!(
            TransportError::Network("dns".into()).kind(),
            FailureKind::Network
        );
        assert_eq!(TransportError::RateLimited.kind(), FailureKind::RateLimited);
        assert_eq!(TransportError::Server(500).kind(), FailureKind::ServerError);
        assert_eq!(
            TransportError::UpstreamRetryable("x".into()).kind(),
            FailureKind::UpstreamRetryable
        );
        assert_eq!(
            TransportError::UpstreamTerminal("x".into()).kind(),
            FailureKind::UpstreamTerminal
        );
        assert_eq!(
            TransportError::EmptyResponse.kind(),
            FailureKind::EmptyResponse
        );
    }
}

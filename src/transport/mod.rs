//! Transport seam and request/response types.
//!
//! The gateway never executes requests itself; it wraps a [`Transport`] that
//! does. The bundled [`HttpTransport`] covers the common case; tests and
//! non-HTTP providers supply their own implementations.

mod http;

pub use http::HttpTransport;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error_handling::TransportError;

/// Query family of a request, used to route it to the correct quota bucket.
///
/// The upstream provider enforces separate per-second quotas for its bulk
/// (low-level) and rich (high-level) query families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    /// Bulk/low-level query family.
    Bulk,
    /// Rich/high-level query family.
    Rich,
}

impl Classification {
    /// All classifications, in bucket-index order.
    pub const ALL: [Classification; 2] = [Classification::Bulk, Classification::Rich];

    pub(crate) fn index(self) -> usize {
        match self {
            Classification::Bulk => 0,
            Classification::Rich => 1,
        }
    }

    /// Human-readable label, used in logs.
    pub fn label(self) -> &'static str {
        match self {
            Classification::Bulk => "bulk",
            Classification::Rich => "rich",
        }
    }
}

/// Descriptor of one upstream request.
///
/// Opaque to the gateway: it is forwarded unmodified to the transport. The
/// gateway only reads it to derive the dedup key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSpec {
    /// Upstream method or verb.
    pub method: String,
    /// Primary parameter: URL, account, resource identifier.
    pub target: String,
    /// Optional request payload.
    pub body: Option<String>,
}

impl RequestSpec {
    /// Creates a spec with no payload.
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        RequestSpec {
            method: method.into(),
            target: target.into(),
            body: None,
        }
    }

    /// Grouping key for fair batching.
    ///
    /// Derived from method plus primary parameter. This is not a cache key:
    /// two envelopes with the same dedup key are both executed.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.method, self.target)
    }
}

/// A usable upstream response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Upstream status code.
    pub status: u16,
    /// Raw response payload. Parsing and interpretation belong to the caller.
    pub body: String,
}

/// Executes one request attempt against the upstream.
///
/// Implementations classify every failure into the [`TransportError`]
/// taxonomy at this boundary, so the retry engine and circuit breaker operate
/// on a closed set of variants. Attempt timeouts are enforced by the gateway
/// around the returned future; implementations do not need their own
/// per-attempt deadline.
pub trait Transport: Send + Sync {
    /// Runs a single attempt.
    fn call(&self, spec: RequestSpec) -> BoxFuture<'_, Result<Response, TransportError>>;
}

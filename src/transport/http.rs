//! reqwest-backed transport.
//!
//! Interprets `RequestSpec.method` as an HTTP method and `target` as a URL.
//! Providers with an RPC-style surface (method name + params in the body)
//! should wrap this or implement [`Transport`] directly.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{Client, Method};

use super::{RequestSpec, Response, Transport};
use crate::config::TCP_CONNECT_TIMEOUT_SECS;
use crate::error_handling::{categorize_reqwest_error, InitializationError, TransportError};

/// HTTP transport over a shared `reqwest::Client`.
///
/// The client carries no request timeout of its own; the retry engine wraps
/// each attempt in a growing deadline.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds a transport with connection pooling and a TCP connect timeout.
    pub fn new() -> Result<Self, InitializationError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(TCP_CONNECT_TIMEOUT_SECS))
            .build()?;
        Ok(HttpTransport { client })
    }

    /// Wraps an existing client, e.g. one configured with custom TLS or
    /// proxy settings.
    pub fn with_client(client: Client) -> Self {
        HttpTransport { client }
    }
}

impl Transport for HttpTransport {
    fn call(&self, spec: RequestSpec) -> BoxFuture<'_, Result<Response, TransportError>> {
        Box::pin(async move {
            let method = Method::from_bytes(spec.method.as_bytes()).map_err(|_| {
                TransportError::UpstreamTerminal(format!(
                    "unsupported HTTP method: {}",
                    spec.method
                ))
            })?;

            let mut request = self.client.request(method, &spec.target);
            if let Some(body) = spec.body {
                request = request
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(body);
            }

            let response = request
                .send()
                .await
                .map_err(|e| categorize_reqwest_error(&e))?;

            let status = response.status();
            match status.as_u16() {
                429 => Err(TransportError::RateLimited),
                code if status.is_server_error() => Err(TransportError::Server(code)),
                code if status.is_client_error() => Err(TransportError::UpstreamTerminal(
                    format!("upstream rejected request with status {code}"),
                )),
                code => {
                    let body = response
                        .text()
                        .await
                        .map_err(|e| categorize_reqwest_error(&e))?;
                    if body.trim().is_empty() {
                        Err(TransportError::EmptyResponse)
                    } else {
                        Ok(Response { status: code, body })
                    }
                }
            }
        })
    }
}

//! One network attempt, in async and blocking flavors.
//!
//! [`Transport`] and [`BlockingTransport`] are the only mode-specific seams in
//! the client. Everything above them (request building, retry decisions,
//! rate-limit bookkeeping, response mapping) is shared. Tests substitute
//! scripted implementations to count attempts without a network.

use std::future::Future;
use std::pin::Pin;

use reqwest::header::HeaderMap;
use tracing::trace;

use crate::api::request::PreparedRequest;
use crate::config::ClientConfig;
use crate::error::{ConfigProblem, Error, Result};

/// Boxed future returned by [`Transport::execute`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = AttemptOutcome> + Send + 'a>>;

/// Performs a single async attempt. Never retries.
pub trait Transport: Send + Sync {
    fn execute(&self, request: PreparedRequest) -> TransportFuture<'_>;
}

/// Performs a single blocking attempt. Never retries.
pub trait BlockingTransport: Send + Sync {
    fn execute(&self, request: PreparedRequest) -> AttemptOutcome;
}

/// Status, headers, and fully-read body of one response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailureKind {
    /// Connect, DNS, TLS, reset, or body-read failure.
    Network,
    /// The per-attempt deadline elapsed.
    Timeout,
}

/// A failure below HTTP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub kind: TransportFailureKind,
    /// True once the status line was received; the server may have acted.
    pub response_started: bool,
    pub message: String,
}

impl TransportFailure {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: TransportFailureKind::Network,
            response_started: false,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: TransportFailureKind::Timeout,
            response_started: false,
            message: message.into(),
        }
    }

    pub fn after_response(mut self) -> Self {
        self.response_started = true;
        self
    }

    fn from_reqwest(err: &reqwest::Error, response_started: bool) -> Self {
        let kind = if err.is_timeout() {
            TransportFailureKind::Timeout
        } else {
            TransportFailureKind::Network
        };
        Self {
            kind,
            response_started,
            message: describe(err),
        }
    }
}

/// Walk the source chain so "connection refused" survives reqwest's wrapping.
fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }
    message
}

/// Result of one attempt.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    /// Status in `[200, 299)`.
    Success(RawResponse),
    TransportFailure(TransportFailure),
    /// Any other status.
    HttpFailure(RawResponse),
}

impl AttemptOutcome {
    /// Classify a complete response by status.
    pub fn from_response(response: RawResponse) -> Self {
        if (200..299).contains(&response.status) {
            AttemptOutcome::Success(response)
        } else {
            AttemptOutcome::HttpFailure(response)
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AttemptOutcome::Success(r) | AttemptOutcome::HttpFailure(r) => Some(r.status),
            AttemptOutcome::TransportFailure(_) => None,
        }
    }

    pub fn headers(&self) -> Option<&HeaderMap> {
        match self {
            AttemptOutcome::Success(r) | AttemptOutcome::HttpFailure(r) => Some(&r.headers),
            AttemptOutcome::TransportFailure(_) => None,
        }
    }
}

// ── reqwest implementations ──

/// Async transport over a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()
            .map_err(|e| {
                Error::configuration(
                    ConfigProblem::HttpClient,
                    format!("failed to build HTTP client: {e}"),
                )
            })?;
        Ok(Self { client })
    }

    /// Wrap an existing client (shares its connection pool).
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: PreparedRequest) -> TransportFuture<'_> {
        let mut builder = self
            .client
            .request(request.method.as_reqwest(), request.url)
            .headers(request.headers)
            .timeout(request.timeout);
        if let Some(body) = request.body {
            trace!(bytes = body.len(), "request body");
            builder = builder.body(body);
        }

        Box::pin(async move {
            let response = match builder.send().await {
                Ok(response) => response,
                Err(e) => {
                    return AttemptOutcome::TransportFailure(TransportFailure::from_reqwest(
                        &e, false,
                    ));
                }
            };
            let status = response.status().as_u16();
            let headers = response.headers().clone();
            match response.bytes().await {
                Ok(body) => {
                    trace!(status, bytes = body.len(), "response body");
                    AttemptOutcome::from_response(RawResponse {
                        status,
                        headers,
                        body: body.to_vec(),
                    })
                }
                Err(e) => AttemptOutcome::TransportFailure(TransportFailure::from_reqwest(&e, true)),
            }
        })
    }
}

/// Blocking transport over a pooled `reqwest::blocking::Client`.
///
/// Must not be constructed or used from inside an async runtime thread.
#[derive(Debug, Clone)]
pub struct BlockingReqwestTransport {
    client: reqwest::blocking::Client,
}

impl BlockingReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()
            .map_err(|e| {
                Error::configuration(
                    ConfigProblem::HttpClient,
                    format!("failed to build blocking HTTP client: {e}"),
                )
            })?;
        Ok(Self { client })
    }
}

impl BlockingTransport for BlockingReqwestTransport {
    fn execute(&self, request: PreparedRequest) -> AttemptOutcome {
        let mut builder = self
            .client
            .request(request.method.as_reqwest(), request.url)
            .headers(request.headers)
            .timeout(request.timeout);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = match builder.send() {
            Ok(response) => response,
            Err(e) => {
                return AttemptOutcome::TransportFailure(TransportFailure::from_reqwest(&e, false));
            }
        };
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        match response.bytes() {
            Ok(body) => AttemptOutcome::from_response(RawResponse {
                status,
                headers,
                body: body.to_vec(),
            }),
            Err(e) => AttemptOutcome::TransportFailure(TransportFailure::from_reqwest(&e, true)),
        }
    }
}

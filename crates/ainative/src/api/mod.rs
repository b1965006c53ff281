//! Transport core: everything between a resource method and the wire.
//!
//! - [`request`]: [`OperationDescriptor`] and the pure [`build_request`]
//!   that turns it into a [`PreparedRequest`] (URL, headers, signing, body).
//! - [`transport`]: one network attempt behind the [`Transport`] /
//!   [`BlockingTransport`] traits, with `reqwest` implementations.
//! - [`retry`]: [`RetryConfig`] decides retry vs. give-up, with exponential
//!   backoff, jitter, and `Retry-After` support. Never retries 4xx.
//! - [`rate_limit`]: [`RateLimiter`] tracks advertised quota and delays
//!   requests proactively when the window is exhausted.
//! - [`response`]: maps the final [`AttemptOutcome`] to an [`ApiResponse`] or
//!   a typed [`Error`](crate::Error).

pub mod rate_limit;
pub mod request;
pub mod response;
pub mod retry;
pub mod transport;

pub use rate_limit::{Clock, ManualClock, RateLimitState, RateLimiter, SystemClock};
pub use request::{AttemptStamp, Method, OperationDescriptor, PreparedRequest, build_request};
pub use response::{ApiResponse, map_outcome};
pub use retry::{Decision, RetryConfig};
pub use transport::{
    AttemptOutcome, BlockingReqwestTransport, BlockingTransport, RawResponse, ReqwestTransport,
    Transport, TransportFailure, TransportFailureKind, TransportFuture,
};

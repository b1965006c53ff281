//! Error taxonomy for every client operation.
//!
//! All failures surface as a single [`Error`] value. Its [`ErrorKind`] is a
//! closed enum, so callers dispatch with an exhaustive `match` on
//! [`Error::kind`] instead of downcasting. Each error keeps the HTTP status
//! and raw response body (when there was a response) for diagnostics, and a
//! `retryable` flag that mirrors the retry policy's classification.
//!
//! By the time a caller sees a retryable error, the client has already
//! exhausted its local retries.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong while assembling client configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigProblem {
    /// No credential source produced an API key.
    MissingApiKey,
    /// The base URL is not an absolute http(s) URL.
    InvalidBaseUrl,
    /// The configuration file could not be read, parsed, or written.
    ConfigFile,
    /// The underlying HTTP client could not be constructed.
    HttpClient,
}

impl fmt::Display for ConfigProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigProblem::MissingApiKey => write!(f, "missing api key"),
            ConfigProblem::InvalidBaseUrl => write!(f, "invalid base url"),
            ConfigProblem::ConfigFile => write!(f, "config file"),
            ConfigProblem::HttpClient => write!(f, "http client"),
        }
    }
}

/// Closed set of failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Raised before any network attempt.
    Configuration(ConfigProblem),
    /// Malformed operation descriptor, or server 400/422.
    Validation,
    /// Server 401.
    Authentication,
    /// Server 403.
    Authorization,
    /// Server 404.
    NotFound,
    /// Server 409.
    Conflict,
    /// Server 429 after retries were exhausted.
    RateLimit,
    /// Server 5xx after retries were exhausted.
    Server,
    /// Connection, DNS, TLS, or reset failure after retries were exhausted.
    Network,
    /// Per-attempt timeout after retries were exhausted.
    Timeout,
    /// Success status with a body that does not decode as declared.
    Decoding,
    /// Any status the taxonomy does not otherwise classify.
    UnexpectedStatus,
    /// The caller cancelled the operation.
    Cancelled,
}

impl ErrorKind {
    /// Default `retryable` classification for errors of this kind.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimit | ErrorKind::Server | ErrorKind::Network | ErrorKind::Timeout
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Configuration(problem) => write!(f, "configuration error ({problem})"),
            ErrorKind::Validation => write!(f, "validation error"),
            ErrorKind::Authentication => write!(f, "authentication error"),
            ErrorKind::Authorization => write!(f, "authorization error"),
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::RateLimit => write!(f, "rate limit exceeded"),
            ErrorKind::Server => write!(f, "server error"),
            ErrorKind::Network => write!(f, "network error"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Decoding => write!(f, "decoding error"),
            ErrorKind::UnexpectedStatus => write!(f, "unexpected status"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A single field-level problem reported by the server on 400/422.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// A typed client failure.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    status: Option<u16>,
    message: String,
    retryable: bool,
    raw_body: Option<String>,
    retry_after: Option<Duration>,
    field_errors: Vec<FieldError>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            retryable: kind.is_transient(),
            raw_body: None,
            retry_after: None,
            field_errors: Vec::new(),
        }
    }

    pub fn configuration(problem: ConfigProblem, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration(problem), message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "operation cancelled by caller")
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_raw_body(mut self, body: impl Into<String>) -> Self {
        let body = body.into();
        self.raw_body = (!body.is_empty()).then_some(body);
        self
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    pub fn with_field_errors(mut self, field_errors: Vec<FieldError>) -> Self {
        self.field_errors = field_errors;
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// HTTP status of the final attempt, if the server answered.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the failure was classified as transient.
    ///
    /// Informational: local retries have already run.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn raw_body(&self) -> Option<&str> {
        self.raw_body.as_deref()
    }

    /// Server-provided `Retry-After` hint, for rate-limit errors.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    pub fn field_errors(&self) -> &[FieldError] {
        &self.field_errors
    }
}

//! Operation descriptors and request construction.
//!
//! Resource methods describe *what* to call with an [`OperationDescriptor`].
//! [`build_request`] turns that description plus [`Credentials`] into a
//! [`PreparedRequest`] for exactly one attempt. The function is pure: the
//! per-attempt request id and timestamp come in through [`AttemptStamp`], so
//! the same inputs always produce the same request.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Url;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::auth::Credentials;
use crate::error::{Error, Result};
use crate::{SDK_LANGUAGE, SDK_VERSION};

pub const HEADER_API_KEY: &str = "x-api-key";
pub const HEADER_SDK_VERSION: &str = "x-sdk-version";
pub const HEADER_SDK_LANGUAGE: &str = "x-sdk-language";
pub const HEADER_ORGANIZATION: &str = "x-organization-id";
pub const HEADER_REQUEST_ID: &str = "x-request-id";
pub const HEADER_IDEMPOTENCY_KEY: &str = "idempotency-key";
pub const HEADER_TIMESTAMP: &str = "x-timestamp";
pub const HEADER_SIGNATURE: &str = "x-signature";

/// HTTP methods the platform uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Whether repeating the call has the same effect as issuing it once.
    pub fn is_idempotent(self) -> bool {
        matches!(self, Method::Get | Method::Put | Method::Delete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    pub(crate) fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A description of one logical API call.
///
/// Retries of the operation reuse the same descriptor, so the idempotency
/// key (if any) stays stable across attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    pub method: Method,
    /// Path relative to the base URL, with `{name}` placeholders.
    pub path: String,
    pub path_params: BTreeMap<String, String>,
    /// Query parameters in insertion order. `None` values are omitted.
    pub query: Vec<(String, Option<String>)>,
    pub body: Option<Value>,
    pub idempotent: bool,
    pub idempotency_key: Option<String>,
    /// Overrides the client's per-attempt timeout.
    pub timeout: Option<Duration>,
    /// Overrides the client's maximum attempt count.
    pub max_attempts: Option<u32>,
}

impl OperationDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            path_params: BTreeMap::new(),
            query: Vec::new(),
            body: None,
            idempotent: method.is_idempotent(),
            idempotency_key: None,
            timeout: None,
            max_attempts: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), Some(value.to_string())));
        self
    }

    /// Add a query parameter that is only sent when `value` is present.
    pub fn with_query_opt<V: ToString>(mut self, name: impl Into<String>, value: Option<V>) -> Self {
        self.query.push((name.into(), value.map(|v| v.to_string())));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    /// Safe to re-issue after the server may have processed it.
    pub fn is_retry_safe(&self) -> bool {
        self.idempotent || self.idempotency_key.is_some()
    }
}

/// Values that differ between attempts of the same operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptStamp {
    pub request_id: String,
    /// Unix seconds, used for request signing.
    pub timestamp: i64,
}

impl AttemptStamp {
    pub fn fresh() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// A fully assembled request, owned by the transport for one attempt.
#[derive(Debug)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

/// Assemble the request for one attempt of `op`.
pub fn build_request(
    op: &OperationDescriptor,
    credentials: &Credentials,
    default_timeout: Duration,
    stamp: &AttemptStamp,
) -> Result<PreparedRequest> {
    let url = resolve_url(credentials.base_url(), op)?;

    let body = op
        .body
        .as_ref()
        .map(serde_json::to_vec)
        .transpose()
        .map_err(|e| Error::validation(format!("request body is not serializable: {e}")))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static(HEADER_API_KEY),
        sensitive_value(credentials.api_key(), "api key")?,
    );
    headers.insert(
        HeaderName::from_static(HEADER_SDK_VERSION),
        HeaderValue::from_static(SDK_VERSION),
    );
    headers.insert(
        HeaderName::from_static(HEADER_SDK_LANGUAGE),
        HeaderValue::from_static(SDK_LANGUAGE),
    );
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(crate::USER_AGENT));
    headers.insert(
        HeaderName::from_static(HEADER_REQUEST_ID),
        plain_value(&stamp.request_id, "request id")?,
    );

    if let Some(org) = credentials.organization_id() {
        headers.insert(
            HeaderName::from_static(HEADER_ORGANIZATION),
            plain_value(org, "organization id")?,
        );
    }
    if body.is_some() {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    if let Some(key) = &op.idempotency_key {
        headers.insert(
            HeaderName::from_static(HEADER_IDEMPOTENCY_KEY),
            plain_value(key, "idempotency key")?,
        );
    }
    if let Some(signature) = credentials.sign(stamp.timestamp) {
        headers.insert(
            HeaderName::from_static(HEADER_TIMESTAMP),
            HeaderValue::from(stamp.timestamp),
        );
        headers.insert(
            HeaderName::from_static(HEADER_SIGNATURE),
            sensitive_value(&signature, "signature")?,
        );
    }

    Ok(PreparedRequest {
        method: op.method,
        url,
        headers,
        body,
        timeout: op.timeout.unwrap_or(default_timeout),
    })
}

fn resolve_url(base: &Url, op: &OperationDescriptor) -> Result<Url> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| Error::validation(format!("base url '{base}' cannot carry a path")))?;
        segments.pop_if_empty();
        for template in op.path.split('/').filter(|s| !s.is_empty()) {
            segments.push(&substitute(template, &op.path_params, &op.path)?);
        }
    }

    if op.query.iter().any(|(_, value)| value.is_some()) {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in &op.query {
            if let Some(value) = value {
                pairs.append_pair(name, value);
            }
        }
    }
    Ok(url)
}

/// Replace every `{name}` in one path segment.
fn substitute(segment: &str, params: &BTreeMap<String, String>, path: &str) -> Result<String> {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;
    while let Some((before, after)) = rest.split_once('{') {
        out.push_str(before);
        let (name, tail) = after.split_once('}').ok_or_else(|| {
            Error::validation(format!("unterminated placeholder in path '{path}'"))
        })?;
        let value = params
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                Error::validation(format!("missing path parameter '{name}' for '{path}'"))
            })?;
        out.push_str(value);
        rest = tail;
    }
    out.push_str(rest);
    Ok(out)
}

fn plain_value(value: &str, what: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| Error::validation(format!("{what} contains characters not allowed in a header")))
}

fn sensitive_value(value: &str, what: &str) -> Result<HeaderValue> {
    let mut header = plain_value(value, what)?;
    header.set_sensitive(true);
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn creds() -> Credentials {
        Credentials::new("key-abc", "https://api.example.com").unwrap()
    }

    fn stamp() -> AttemptStamp {
        AttemptStamp {
            request_id: "req-1".into(),
            timestamp: 1_704_067_200,
        }
    }

    fn build(op: &OperationDescriptor) -> Result<PreparedRequest> {
        build_request(op, &creds(), Duration::from_secs(30), &stamp())
    }

    #[test]
    fn idempotency_defaults_follow_method() {
        assert!(OperationDescriptor::get("/x").idempotent);
        assert!(OperationDescriptor::put("/x").idempotent);
        assert!(OperationDescriptor::delete("/x").idempotent);
        assert!(!OperationDescriptor::post("/x").idempotent);
        assert!(!OperationDescriptor::patch("/x").idempotent);
        assert!(OperationDescriptor::post("/x").with_idempotency_key("k").is_retry_safe());
    }

    #[test]
    fn path_params_are_substituted_and_encoded() {
        let op = OperationDescriptor::get("/zerodb/projects/{id}/statistics")
            .with_path_param("id", "a b/c");
        let req = build(&op).unwrap();
        assert_eq!(
            req.url.as_str(),
            "https://api.example.com/api/v1/zerodb/projects/a%20b%2Fc/statistics"
        );
    }

    #[test]
    fn missing_path_param_is_validation_error() {
        let op = OperationDescriptor::get("/zerodb/projects/{id}");
        let err = build(&op).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.message().contains("'id'"));

        let empty = OperationDescriptor::get("/zerodb/projects/{id}").with_path_param("id", " ");
        assert_eq!(build(&empty).unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn absent_query_values_are_omitted() {
        let op = OperationDescriptor::get("/zerodb/projects")
            .with_query("limit", 10)
            .with_query_opt("status", None::<&str>)
            .with_query_opt("organization_id", Some("org 1"));
        let req = build(&op).unwrap();
        assert_eq!(req.url.query(), Some("limit=10&organization_id=org+1"));

        let bare = OperationDescriptor::get("/health").with_query_opt("x", None::<u32>);
        assert_eq!(build(&bare).unwrap().url.query(), None);
    }

    #[test]
    fn standard_headers_present() {
        let req = build(&OperationDescriptor::get("/health")).unwrap();
        assert_eq!(req.headers[HEADER_API_KEY], "key-abc");
        assert!(req.headers[HEADER_API_KEY].is_sensitive());
        assert_eq!(req.headers[HEADER_SDK_LANGUAGE], "Rust");
        assert_eq!(req.headers[HEADER_REQUEST_ID], "req-1");
        assert_eq!(req.headers[ACCEPT], "application/json");
        assert!(req.headers.get(CONTENT_TYPE).is_none());
        assert!(req.headers.get(HEADER_ORGANIZATION).is_none());
        assert!(req.headers.get(HEADER_SIGNATURE).is_none());
        assert_eq!(req.timeout, Duration::from_secs(30));
    }

    #[test]
    fn signature_and_org_headers_when_configured() {
        let creds = creds()
            .with_api_secret("shh")
            .with_organization_id("org_1");
        let req = build_request(
            &OperationDescriptor::get("/health"),
            &creds,
            Duration::from_secs(30),
            &stamp(),
        )
        .unwrap();
        assert_eq!(req.headers[HEADER_ORGANIZATION], "org_1");
        assert_eq!(req.headers[HEADER_TIMESTAMP], "1704067200");
        assert_eq!(
            req.headers[HEADER_SIGNATURE].to_str().unwrap(),
            creds.sign(1_704_067_200).unwrap()
        );
    }

    #[test]
    fn body_round_trips_as_json() {
        let op = OperationDescriptor::post("/zerodb/memory").with_body(json!({"a": 1}));
        let req = build(&op).unwrap();
        assert_eq!(req.headers[CONTENT_TYPE], "application/json");
        let decoded: Value = serde_json::from_slice(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(decoded, json!({"a": 1}));
    }

    #[test]
    fn delete_may_carry_a_body() {
        let op = OperationDescriptor::delete("/zerodb/vectors").with_body(json!({"ids": ["v1"]}));
        let req = build(&op).unwrap();
        assert_eq!(req.method, Method::Delete);
        assert!(req.body.is_some());
    }

    #[test]
    fn idempotency_key_and_timeout_override() {
        let op = OperationDescriptor::post("/agent-swarm/start")
            .with_idempotency_key("swarm-42")
            .with_timeout(Duration::from_secs(5));
        let req = build(&op).unwrap();
        assert_eq!(req.headers[HEADER_IDEMPOTENCY_KEY], "swarm-42");
        assert_eq!(req.timeout, Duration::from_secs(5));
    }
}

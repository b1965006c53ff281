//! Mapping attempt outcomes onto [`ApiResponse`] or a typed [`Error`].

use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::retry::{is_transient_status, retry_after_hint};
use crate::api::transport::{AttemptOutcome, RawResponse, TransportFailure, TransportFailureKind};
use crate::error::{Error, ErrorKind, FieldError, Result};

/// A successful response with its body decoded as JSON.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    /// `{}` for an empty body; a JSON string for non-JSON content types.
    pub body: Value,
}

impl ApiResponse {
    /// Decode the body into a caller type.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.body).map_err(|e| {
            Error::new(
                ErrorKind::Decoding,
                format!("response body does not match the expected shape: {e}"),
            )
            .with_status(self.status)
            .with_raw_body(self.body.to_string())
        })
    }

    pub fn into_body(self) -> Value {
        self.body
    }

    /// The array under `key`, or an empty list when absent.
    pub fn list(&self, key: &str) -> Vec<Value> {
        match self.body.get(key) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    }
}

/// Convert the final outcome of an operation.
pub fn map_outcome(outcome: AttemptOutcome, now: DateTime<Utc>) -> Result<ApiResponse> {
    match outcome {
        AttemptOutcome::Success(response) => decode_success(response),
        AttemptOutcome::HttpFailure(response) => Err(http_error(response, now)),
        AttemptOutcome::TransportFailure(failure) => Err(transport_error(failure)),
    }
}

fn decode_success(response: RawResponse) -> Result<ApiResponse> {
    let RawResponse {
        status,
        headers,
        body,
    } = response;

    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_none_or(|ct| ct.to_ascii_lowercase().contains("json"));

    let value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else if is_json {
        serde_json::from_slice(&body).map_err(|e| {
            Error::new(ErrorKind::Decoding, format!("invalid JSON in response: {e}"))
                .with_status(status)
                .with_raw_body(String::from_utf8_lossy(&body).into_owned())
        })?
    } else {
        Value::String(String::from_utf8_lossy(&body).into_owned())
    };

    Ok(ApiResponse {
        status,
        headers,
        body: value,
    })
}

fn http_error(response: RawResponse, now: DateTime<Utc>) -> Error {
    let status = response.status;
    let kind = match status {
        400 | 422 => ErrorKind::Validation,
        401 => ErrorKind::Authentication,
        403 => ErrorKind::Authorization,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::Conflict,
        429 => ErrorKind::RateLimit,
        500..=599 => ErrorKind::Server,
        _ => ErrorKind::UnexpectedStatus,
    };

    let parsed: Option<Value> = serde_json::from_slice(&response.body).ok();
    let message = parsed
        .as_ref()
        .and_then(server_message)
        .unwrap_or_else(|| default_message(status));

    let mut err = Error::new(kind, message)
        .with_status(status)
        .with_retryable(is_transient_status(status))
        .with_raw_body(String::from_utf8_lossy(&response.body).into_owned());

    match kind {
        ErrorKind::Validation => {
            let fields = parsed.as_ref().map(field_errors).unwrap_or_default();
            err = err.with_field_errors(fields);
        }
        ErrorKind::RateLimit => {
            err = err.with_retry_after(retry_after_hint(&response.headers, now));
        }
        _ => {}
    }
    err
}

fn transport_error(failure: TransportFailure) -> Error {
    let kind = match failure.kind {
        TransportFailureKind::Network => ErrorKind::Network,
        TransportFailureKind::Timeout => ErrorKind::Timeout,
    };
    Error::new(kind, failure.message)
}

fn default_message(status: u16) -> String {
    match status {
        401 => "invalid or missing API key".into(),
        403 => "access denied".into(),
        404 => "resource not found".into(),
        429 => "rate limit exceeded".into(),
        _ => format!("HTTP {status}"),
    }
}

/// Human-readable message from common error body shapes.
fn server_message(body: &Value) -> Option<String> {
    let text = |v: &Value| v.as_str().map(str::to_string);
    body.get("detail")
        .and_then(text)
        .or_else(|| body.get("message").and_then(text))
        .or_else(|| body.get("error").and_then(text))
        .or_else(|| {
            body.get("error")
                .and_then(|e| e.get("message"))
                .and_then(text)
        })
        .or_else(|| {
            body.get("detail")
                .filter(|d| d.is_array())
                .map(|_| "request validation failed".to_string())
        })
}

/// Field errors from `{"detail": [{"loc": [..], "msg": ..}]}` or
/// `{"errors": [{"field": .., "message": ..}]}`.
fn field_errors(body: &Value) -> Vec<FieldError> {
    if let Some(Value::Array(items)) = body.get("detail") {
        return items
            .iter()
            .filter_map(|item| {
                let message = item.get("msg")?.as_str()?.to_string();
                let field = item
                    .get("loc")
                    .and_then(Value::as_array)
                    .map(|loc| {
                        loc.iter()
                            .filter(|part| part.as_str() != Some("body"))
                            .map(|part| match part {
                                Value::String(s) => s.clone(),
                                other => other.to_string(),
                            })
                            .collect::<Vec<_>>()
                            .join(".")
                    })
                    .unwrap_or_default();
                Some(FieldError { field, message })
            })
            .collect();
    }
    if let Some(Value::Array(items)) = body.get("errors") {
        return items
            .iter()
            .filter_map(|item| {
                Some(FieldError {
                    field: item.get("field")?.as_str()?.to_string(),
                    message: item
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("invalid")
                        .to_string(),
                })
            })
            .collect();
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, RETRY_AFTER};
    use serde_json::json;
    use std::time::Duration;

    fn response(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status,
            headers: HeaderMap::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    fn map(outcome: AttemptOutcome) -> Result<ApiResponse> {
        map_outcome(outcome, Utc::now())
    }

    fn fail(status: u16, body: &str) -> Error {
        map(AttemptOutcome::HttpFailure(response(status, body))).unwrap_err()
    }

    #[test]
    fn success_decodes_json() {
        let ok = map(AttemptOutcome::Success(response(200, r#"{"id":"p1","n":[1,2]}"#))).unwrap();
        assert_eq!(ok.body, json!({"id": "p1", "n": [1, 2]}));
        assert_eq!(ok.list("n").len(), 2);
        assert!(ok.list("missing").is_empty());
    }

    #[test]
    fn empty_body_becomes_empty_object() {
        let ok = map(AttemptOutcome::Success(response(204, ""))).unwrap();
        assert_eq!(ok.body, json!({}));
    }

    #[test]
    fn non_json_content_type_is_kept_as_text() {
        let mut raw = response(200, "pong");
        raw.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let ok = map(AttemptOutcome::Success(raw)).unwrap();
        assert_eq!(ok.body, json!("pong"));
    }

    #[test]
    fn malformed_success_body_is_decoding_error() {
        let err = map(AttemptOutcome::Success(response(200, "{not json"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decoding);
        assert_eq!(err.raw_body(), Some("{not json"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn typed_decoding_mismatch_is_decoding_error() {
        #[derive(Debug, serde::Deserialize)]
        struct Project {
            #[allow(dead_code)]
            id: String,
        }
        let ok = map(AttemptOutcome::Success(response(200, r#"{"id": 7}"#))).unwrap();
        assert_eq!(ok.json::<Project>().unwrap_err().kind(), ErrorKind::Decoding);
    }

    #[test]
    fn status_taxonomy() {
        let cases = [
            (400, ErrorKind::Validation),
            (401, ErrorKind::Authentication),
            (403, ErrorKind::Authorization),
            (404, ErrorKind::NotFound),
            (409, ErrorKind::Conflict),
            (422, ErrorKind::Validation),
            (429, ErrorKind::RateLimit),
            (500, ErrorKind::Server),
            (503, ErrorKind::Server),
            (299, ErrorKind::UnexpectedStatus),
            (302, ErrorKind::UnexpectedStatus),
        ];
        for (status, kind) in cases {
            let err = fail(status, "");
            assert_eq!(err.kind(), kind, "status {status}");
            assert_eq!(err.status(), Some(status));
        }
    }

    #[test]
    fn retryable_flag_mirrors_policy() {
        assert!(fail(503, "").is_retryable());
        assert!(fail(429, "").is_retryable());
        assert!(!fail(501, "").is_retryable());
        assert!(!fail(404, "").is_retryable());
    }

    #[test]
    fn server_message_and_raw_body_preserved() {
        let err = fail(404, r#"{"detail":"Project not found"}"#);
        assert_eq!(err.message(), "Project not found");
        assert_eq!(err.raw_body(), Some(r#"{"detail":"Project not found"}"#));

        let err = fail(500, "<html>upstream died</html>");
        assert_eq!(err.message(), "HTTP 500");
        assert_eq!(err.raw_body(), Some("<html>upstream died</html>"));
    }

    #[test]
    fn validation_field_errors_from_detail_list() {
        let body = r#"{"detail":[{"loc":["body","name"],"msg":"field required","type":"missing"}]}"#;
        let err = fail(422, body);
        assert_eq!(err.message(), "request validation failed");
        assert_eq!(
            err.field_errors(),
            &[FieldError {
                field: "name".into(),
                message: "field required".into()
            }]
        );
    }

    #[test]
    fn validation_field_errors_from_errors_list() {
        let err = fail(400, r#"{"message":"bad input","errors":[{"field":"top_k","message":"must be positive"}]}"#);
        assert_eq!(err.message(), "bad input");
        assert_eq!(err.field_errors().len(), 1);
        assert_eq!(err.field_errors()[0].field, "top_k");
    }

    #[test]
    fn rate_limit_carries_retry_after() {
        let mut raw = response(429, "");
        raw.headers.insert(RETRY_AFTER, HeaderValue::from_static("42"));
        let err = map(AttemptOutcome::HttpFailure(raw)).unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(42)));

        assert_eq!(fail(429, "").retry_after(), None);

        let mut huge = response(429, "");
        huge.headers.insert(RETRY_AFTER, HeaderValue::from_static("1e20"));
        let err = map(AttemptOutcome::HttpFailure(huge)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimit);
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn transport_failures_map_to_network_and_timeout() {
        let err = map(AttemptOutcome::TransportFailure(TransportFailure::network("refused"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(err.status(), None);
        assert!(err.is_retryable());

        let err = map(AttemptOutcome::TransportFailure(TransportFailure::timeout("slow"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
}

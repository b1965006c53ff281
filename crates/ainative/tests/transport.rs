//! End-to-end behavior of the async client against a mock HTTP server.

use std::time::Duration;

use ainative::api::{OperationDescriptor, RetryConfig};
use ainative::auth::Credentials;
use ainative::{AinativeClient, ClientConfig, ErrorKind};
use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        jitter: false,
        ..Default::default()
    }
}

fn client(server: &MockServer, max_attempts: u32) -> AinativeClient {
    AinativeClient::builder()
        .api_key("ak_test")
        .base_url(server.uri())
        .config(ClientConfig::default().with_retry(fast_retry(max_attempts)))
        .without_ambient_sources()
        .build()
        .unwrap()
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map_or(0, |r| r.len())
}

#[tokio::test]
async fn sends_auth_and_sdk_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/zerodb/projects"))
        .and(header("x-api-key", "ak_test"))
        .and(header("x-sdk-language", "Rust"))
        .and(header("x-organization-id", "org_1"))
        .and(header_exists("x-request-id"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"projects": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = AinativeClient::builder()
        .api_key("ak_test")
        .organization_id("org_1")
        .base_url(server.uri())
        .without_ambient_sources()
        .build()
        .unwrap();

    let body = client.projects().list(&Default::default()).await.unwrap();
    assert_eq!(body, json!({"projects": []}));
}

#[tokio::test]
async fn signs_requests_when_a_secret_is_configured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let client = AinativeClient::builder()
        .api_key("ak_test")
        .api_secret("s3cret")
        .base_url(server.uri())
        .without_ambient_sources()
        .build()
        .unwrap();
    client.health_check().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let headers = &requests[0].headers;
    let timestamp: i64 = headers
        .get("x-timestamp")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .expect("timestamp header");
    let signature = headers
        .get("x-signature")
        .and_then(|v| v.to_str().ok())
        .expect("signature header");

    let expected = Credentials::new("ak_test", &server.uri())
        .unwrap()
        .with_api_secret("s3cret")
        .sign(timestamp)
        .unwrap();
    assert_eq!(signature, expected);
}

#[tokio::test]
async fn idempotent_request_retries_through_503() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/zerodb/projects/p1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/zerodb/projects/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "p1"})))
        .mount(&server)
        .await;

    let body = client(&server, 3).projects().get("p1").await.unwrap();
    assert_eq!(body["id"], "p1");
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn non_idempotent_post_is_sent_once_on_503() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/zerodb/projects"))
        .and(body_json(json!({
            "name": "demo",
            "description": "",
            "metadata": {},
            "config": {},
        })))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"detail": "overloaded"})))
        .mount(&server)
        .await;

    let err = client(&server, 5)
        .projects()
        .create(&ainative::prelude::NewProject::named("demo"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(err.status(), Some(503));
    assert_eq!(err.message(), "overloaded");
    assert!(err.is_retryable());
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn idempotency_key_makes_post_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/zerodb/memory"))
        .and(header("idempotency-key", "create-42"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/zerodb/memory"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "m1"})))
        .mount(&server)
        .await;

    let op = ainative::resources::memory::create(&ainative::prelude::NewMemory::new("note"))
        .with_idempotency_key("create-42");
    let response = client(&server, 3).send(&op).await.unwrap();
    assert_eq!(response.status, 201);
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn authentication_failure_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client(&server, 3).health_check().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert!(!err.is_retryable());
    assert!(!err.to_string().contains("ak_test"));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn unprocessable_entity_carries_field_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/zerodb/projects"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "detail": [
                {"loc": ["body", "name"], "msg": "field required", "type": "missing"},
                {"loc": ["body", "config", "tier"], "msg": "unknown tier"},
            ]
        })))
        .mount(&server)
        .await;

    let err = client(&server, 3)
        .projects()
        .create(&ainative::prelude::NewProject::named(""))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.message(), "request validation failed");
    let fields: Vec<(&str, &str)> = err
        .field_errors()
        .iter()
        .map(|f| (f.field.as_str(), f.message.as_str()))
        .collect();
    assert_eq!(
        fields,
        vec![("name", "field required"), ("config.tier", "unknown tier")]
    );
    assert!(err.raw_body().unwrap().contains("field required"));
}

#[tokio::test]
async fn rate_limited_get_honors_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/zerodb/usage"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/zerodb/usage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"calls": 7})))
        .mount(&server)
        .await;

    let response = client(&server, 3)
        .send(&ainative::resources::zerodb_usage())
        .await
        .unwrap();
    assert_eq!(response.body, json!({"calls": 7}));
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn exhausted_rate_limit_reports_hint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .mount(&server)
        .await;

    let err = client(&server, 2).health_check().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimit);
    assert_eq!(err.retry_after(), Some(Duration::ZERO));
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn quota_headers_update_the_limiter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-limit", "100")
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", "20")
                .set_body_json(json!({})),
        )
        .mount(&server)
        .await;

    let client = client(&server, 1);
    assert!(client.rate_limiter().snapshot().is_none());
    client.health_check().await.unwrap();

    let state = client.rate_limiter().snapshot().unwrap();
    assert_eq!((state.limit, state.remaining), (100, 0));
    let wait = client.rate_limiter().wait_time().unwrap();
    assert!(wait > Duration::from_secs(15) && wait <= Duration::from_secs(20));
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let op = OperationDescriptor::get("/health").with_timeout(Duration::from_millis(50));
    let err = client(&server, 1).send(&op).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn refused_connection_is_a_network_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = AinativeClient::builder()
        .api_key("ak_test")
        .base_url(format!("http://127.0.0.1:{port}"))
        .config(ClientConfig::default().with_retry(fast_retry(2)))
        .without_ambient_sources()
        .build()
        .unwrap();

    let err = client.health_check().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn empty_success_body_is_an_empty_object() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/zerodb/projects/p%201"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let body = client(&server, 1).projects().delete("p 1").await.unwrap();
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn list_envelopes_are_unwrapped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/zerodb/vectors/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "v1", "score": 0.93}, {"id": "v2", "score": 0.71}],
            "total": 2,
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/agent-swarm/agent-types"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 0})))
        .mount(&server)
        .await;

    let client = client(&server, 1);
    let hits = client
        .vectors()
        .search(&ainative::prelude::VectorSearch::new("proj_1", vec![0.1, 0.2]))
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0]["id"], "v1");

    let types = client.agent_swarm().agent_types().await.unwrap();
    assert!(types.is_empty());
}

#[tokio::test]
async fn concurrent_operations_share_one_client() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/zerodb/projects/p1/statistics"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-limit", "1000")
                .insert_header("x-ratelimit-remaining", "990")
                .insert_header("x-ratelimit-reset", "60")
                .set_body_json(json!({"vectors": 12})),
        )
        .expect(8)
        .mount(&server)
        .await;

    let client = client(&server, 1);
    let calls = (0..8).map(|_| {
        let client = client.clone();
        async move { client.projects().statistics("p1").await }
    });
    let results = futures::future::join_all(calls).await;

    assert!(results.iter().all(|r| r.as_ref().is_ok_and(|b| b["vectors"] == 12)));
    assert_eq!(client.rate_limiter().snapshot().unwrap().remaining, 990);
    assert!(client.rate_limiter().wait_time().is_none());
}

//! The blocking client against a mock HTTP server.
//!
//! `reqwest::blocking` must not be created or dropped on a runtime thread,
//! so each client lives entirely inside `spawn_blocking`.

use std::time::Duration;

use ainative::api::{OperationDescriptor, RetryConfig};
use ainative::{AinativeClient, ClientConfig, ErrorKind};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(max_attempts: u32) -> ClientConfig {
    ClientConfig::default().with_retry(RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(5),
        jitter: false,
        ..Default::default()
    })
}

#[tokio::test]
async fn blocking_get_retries_and_decodes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/zerodb/health"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/zerodb/health"))
        .and(header("x-api-key", "ak_blocking"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
        .mount(&server)
        .await;

    let uri = server.uri();
    let body = tokio::task::spawn_blocking(move || {
        let client = AinativeClient::builder()
            .api_key("ak_blocking")
            .base_url(uri)
            .config(config(3))
            .without_ambient_sources()
            .build_blocking()
            .unwrap();
        client.send(&ainative::resources::zerodb_health())
    })
    .await
    .unwrap()
    .unwrap()
    .into_body();

    assert_eq!(body, json!({"status": "healthy"}));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn blocking_post_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let uri = server.uri();
    let err = tokio::task::spawn_blocking(move || {
        let client = AinativeClient::builder()
            .api_key("ak_blocking")
            .base_url(uri)
            .config(config(4))
            .without_ambient_sources()
            .build_blocking()
            .unwrap();
        client.send(&OperationDescriptor::post("/agent-swarm/start").with_body(json!({})))
    })
    .await
    .unwrap()
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

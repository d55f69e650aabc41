//! Integration tests for the HTTP SMS gateway and alert dispatch over HTTP.
//!
//! These tests run the gateway client against a mock server and check the
//! request shape, status mapping and the dispatcher's aggregate outcome.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use lockwatch_monitor::dispatcher::{AlertDispatcher, DispatchError};
use lockwatch_monitor::store::{ContactStore, MemoryStore, SettingsStore};
use lockwatch_monitor::transport::{
    GatewayConfig, HttpSmsGateway, MessageTransport, TransportError,
};
use lockwatch_monitor::types::{keys, NewContact};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Test Helpers
// =============================================================================

fn gateway(server: &MockServer) -> HttpSmsGateway {
    let config = GatewayConfig::new(server.uri())
        .with_token(Some("test-token".to_string()))
        .with_sender(Some("LockWatch".to_string()))
        .with_request_timeout(Duration::from_secs(5));
    HttpSmsGateway::new(config).unwrap()
}

fn store_with_contacts(phones: &[&str]) -> MemoryStore {
    let store = MemoryStore::new();
    for (i, phone) in phones.iter().enumerate() {
        store
            .add_contact(NewContact::new(format!("Contact {i}"), *phone, false))
            .unwrap();
    }
    store
}

// =============================================================================
// Gateway Tests
// =============================================================================

#[tokio::test]
async fn test_send_posts_json_with_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({
            "to": "+15550100",
            "body": "Are you OK?",
            "from": "LockWatch"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let result = gateway(&server).send("+15550100", "Are you OK?").await;
    tokio_test::assert_ok!(result);
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth_failed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = gateway(&server).send("+1", "hi").await.unwrap_err();
    assert!(matches!(err, TransportError::AuthFailed));
}

#[tokio::test]
async fn test_rate_limit_reports_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "17"))
        .expect(1)
        .mount(&server)
        .await;

    let err = gateway(&server).send("+1", "hi").await.unwrap_err();
    assert!(matches!(
        err,
        TransportError::RateLimited {
            retry_after_secs: 17
        }
    ));
}

#[tokio::test]
async fn test_other_status_is_rejected_with_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(422).set_body_string("invalid phone number"))
        .mount(&server)
        .await;

    let err = gateway(&server).send("not-a-number", "hi").await.unwrap_err();
    match err {
        TransportError::Rejected { status, message } => {
            assert_eq!(status, 422);
            assert_eq!(message, "invalid phone number");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unreachable_gateway_is_http_error() {
    // Reserve a free port, then release it so nothing is listening there.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpSmsGateway::new(GatewayConfig::new(format!("http://{addr}"))).unwrap();
    let err = client.send("+1", "hi").await.unwrap_err();
    assert!(matches!(err, TransportError::Http(_)));
}

// =============================================================================
// Dispatch Over HTTP
// =============================================================================

/// One rejected number must not stop the others, and the gateway is called
/// exactly once per contact (no retries).
#[tokio::test]
async fn test_dispatch_partial_failure_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_json(json!({"to": "+2", "body": "Check on me", "from": "LockWatch"})))
        .respond_with(ResponseTemplate::new(400).set_body_string("blocked"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let store = store_with_contacts(&["+1", "+2", "+3"]);
    store.set(keys::SMS_TEMPLATE, "Check on me").unwrap();

    let dispatcher = AlertDispatcher::new(Arc::new(gateway(&server)));
    let report = dispatcher.dispatch(&store, &store).await.unwrap();

    assert_eq!(report.sent_count, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].phone, "+2");
    assert!(report.failures[0].reason.contains("blocked"));
}

#[tokio::test]
async fn test_dispatch_all_rejected_fails() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(403))
        .expect(2)
        .mount(&server)
        .await;

    let store = store_with_contacts(&["+1", "+2"]);
    let dispatcher = AlertDispatcher::new(Arc::new(gateway(&server)));

    let err = dispatcher.dispatch(&store, &store).await.unwrap_err();
    match err {
        DispatchError::AllSendsFailed { failures } => {
            assert_eq!(failures.len(), 2);
            assert!(failures
                .iter()
                .all(|f| f.reason.contains("authentication failed")));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_slow_gateway_times_out_per_contact() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let store = store_with_contacts(&["+1"]);
    let dispatcher = AlertDispatcher::new(Arc::new(gateway(&server)))
        .with_send_timeout(Duration::from_millis(200));

    let err = dispatcher.dispatch(&store, &store).await.unwrap_err();
    match err {
        DispatchError::AllSendsFailed { failures } => {
            assert!(failures[0].reason.contains("timed out"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

//! Jaeger query client against a mock query service.

use knmap_lib::core::config::JaegerConfig;
use knmap_lib::core::retry::RetryConfig;
use knmap_lib::core::{KnmapError, TimeWindow};
use knmap_lib::jaeger::JaegerClient;
use knmap_lib::service_map::TraceSource;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> JaegerClient {
    let config = JaegerConfig {
        url: server.uri(),
        timeout: Duration::from_secs(5),
        concurrency: 2,
        trace_limit: 0,
        retry: RetryConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            multiplier: 2.0,
            jitter: false,
        },
    };
    JaegerClient::new(&config).unwrap()
}

fn window() -> TimeWindow {
    TimeWindow::from_micros(1_700_000_000_000_000, 1_700_000_060_000_000).unwrap()
}

fn traces_body(trace_id: &str, span_id: &str) -> serde_json::Value {
    json!({
        "data": [{
            "traceID": trace_id,
            "spans": [{
                "traceID": trace_id,
                "spanID": span_id,
                "operationName": "/",
                "references": [],
                "startTime": 1_700_000_000_000_100i64,
                "duration": 10,
                "tags": [{"key": "http.url", "type": "string", "value": "http://orders.shop.svc.cluster.local"}]
            }],
            "processes": {}
        }],
        "total": 0,
        "limit": 0,
        "offset": 0,
        "errors": null
    })
}

async fn mount_services(server: &MockServer, services: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/api/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": services,
            "total": services.len(),
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetches_traces_for_every_service() {
    let server = MockServer::start().await;
    mount_services(&server, &["activator", "orders"]).await;

    for (service, trace_id) in [("activator", "t1"), ("orders", "t2")] {
        Mock::given(method("GET"))
            .and(path("/api/traces"))
            .and(query_param("service", service))
            .and(query_param("start", "1700000000000000"))
            .and(query_param("end", "1700000060000000"))
            .and(query_param("limit", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(traces_body(trace_id, "s1")))
            .expect(1)
            .mount(&server)
            .await;
    }

    let traces = client_for(&server).fetch_traces(window()).await.unwrap();

    let ids: Vec<&str> = traces.iter().map(|t| t.trace_id.as_str()).collect();
    assert_eq!(ids, vec!["t1", "t2"]);
    assert_eq!(traces[0].spans[0].tag("http.url"), Some("http://orders.shop.svc.cluster.local"));
}

#[tokio::test]
async fn test_retries_server_errors() {
    let server = MockServer::start().await;
    mount_services(&server, &["orders"]).await;

    Mock::given(method("GET"))
        .and(path("/api/traces"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/traces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(traces_body("t1", "s1")))
        .expect(1)
        .mount(&server)
        .await;

    let traces = client_for(&server).fetch_traces(window()).await.unwrap();
    assert_eq!(traces.len(), 1);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/services"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server).fetch_traces(window()).await.unwrap_err();
    assert!(matches!(err, KnmapError::Http { status: 404, .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_one_failed_service_fails_the_fetch() {
    let server = MockServer::start().await;
    mount_services(&server, &["orders", "payments"]).await;

    Mock::given(method("GET"))
        .and(path("/api/traces"))
        .and(query_param("service", "orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(traces_body("t1", "s1")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/traces"))
        .and(query_param("service", "payments"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client_for(&server).fetch_traces(window()).await.unwrap_err();
    assert_eq!(err.category(), "network");
}

#[tokio::test]
async fn test_malformed_payload_is_decode_error() {
    let server = MockServer::start().await;
    mount_services(&server, &["orders"]).await;

    Mock::given(method("GET"))
        .and(path("/api/traces"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>upstream connect error</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server).fetch_traces(window()).await.unwrap_err();
    assert!(matches!(err, KnmapError::Decode(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_empty_service_list_yields_no_traces() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
        .mount(&server)
        .await;

    let traces = client_for(&server).fetch_traces(window()).await.unwrap();
    assert!(traces.is_empty());
}

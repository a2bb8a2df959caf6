use keyspace_harvester::config::GatewayConfig;
use keyspace_harvester::gateway::{
    GatewayError, GatewaySettings, RemoteErrorKind, RequestGateway, SearchClient, SearchQuery,
    ShutdownMode,
};
use keyspace_harvester::Credential;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Gateway settings pointed at the mock server, with fast retries
fn test_settings(base_url: &str) -> GatewaySettings {
    let config = GatewayConfig {
        base_url: base_url.to_string(),
        endpoint_path: "/suggest/court".to_string(),
        timeout_ms: 2_000,
        max_retries: 3,
        retry_base_delay_ms: 5,
        max_concurrent: 5,
        requests_per_second: 100,
        result_cap: 20,
    };
    GatewaySettings::from_config(&config)
}

fn test_credential() -> Credential {
    Credential::new("2.env", "key-two", Some("secret-two".to_string()))
}

fn suggestions(codes: &[&str]) -> serde_json::Value {
    let suggestions: Vec<_> = codes
        .iter()
        .map(|code| {
            json!({
                "value": format!("Court {}", code),
                "data": {"code": code, "name": format!("Court {}", code), "region_code": &code[..2]}
            })
        })
        .collect();
    json!({ "suggestions": suggestions })
}

#[tokio::test]
async fn test_search_sends_credentials_and_parses_suggestions() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/suggest/court"))
        .and(header("authorization", "Token key-two"))
        .and(header("x-secret", "secret-two"))
        .and(body_json(json!({"query": "59RS", "count": 20})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(suggestions(&["59RS0001", "59RS0002"])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = RequestGateway::connect(&test_settings(&mock_server.uri()), &test_credential())
        .expect("Failed to connect gateway");

    let result = gateway
        .search(&SearchQuery::new("59RS", 20))
        .await
        .expect("Search failed");

    assert_eq!(result.returned, 2);
    let keys: Vec<&str> = result.entities.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["59RS0001", "59RS0002"]);
    assert_eq!(
        result.entities[0].attribute("name"),
        Some(&json!("Court 59RS0001"))
    );

    let stats = gateway.stats();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.successes, 1);
}

#[tokio::test]
async fn test_search_sends_region_and_type_filters() {
    let mock_server = MockServer::start().await;

    // Count above the cap is clamped
    Mock::given(method("POST"))
        .and(body_json(json!({
            "query": "95RS",
            "count": 20,
            "locations": [{"region_code": "95"}],
            "filters": [{"court_type": "RS"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(suggestions(&["95RS0001"])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = RequestGateway::connect(&test_settings(&mock_server.uri()), &test_credential())
        .expect("Failed to connect gateway");

    let query = SearchQuery::new("95RS", 50).in_region("95").of_kind("RS");
    let result = gateway.search(&query).await.expect("Search failed");
    assert_eq!(result.entities.len(), 1);
}

#[tokio::test]
async fn test_quota_rejection_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Daily limit exceeded"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = RequestGateway::connect(&test_settings(&mock_server.uri()), &test_credential())
        .expect("Failed to connect gateway");

    let error = gateway
        .search(&SearchQuery::new("А", 20))
        .await
        .expect_err("403 should fail");

    assert!(error.is_quota());
    assert!(error.to_string().contains("Daily limit exceeded"));

    let stats = gateway.stats();
    assert_eq!(stats.quota_errors, 1);
    assert_eq!(stats.retries, 0);
}

#[tokio::test]
async fn test_payment_required_is_quota() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(402))
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = RequestGateway::connect(&test_settings(&mock_server.uri()), &test_credential())
        .expect("Failed to connect gateway");

    let error = gateway.search(&SearchQuery::new("А", 20)).await.unwrap_err();
    assert!(matches!(error, GatewayError::QuotaExceeded { .. }));
}

#[tokio::test]
async fn test_server_errors_are_retried_until_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(suggestions(&["59RS0001"])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = RequestGateway::connect(&test_settings(&mock_server.uri()), &test_credential())
        .expect("Failed to connect gateway");

    let result = gateway
        .search(&SearchQuery::new("59", 20))
        .await
        .expect("Search should succeed after retries");
    assert_eq!(result.entities.len(), 1);

    let stats = gateway.stats();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.retries, 2);
    assert_eq!(stats.successes, 1);
    assert_eq!(stats.failures, 0);
}

#[tokio::test]
async fn test_server_errors_give_up_after_max_retries() {
    let mock_server = MockServer::start().await;

    // One attempt plus three retries
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(4)
        .mount(&mock_server)
        .await;

    let gateway = RequestGateway::connect(&test_settings(&mock_server.uri()), &test_credential())
        .expect("Failed to connect gateway");

    let error = gateway.search(&SearchQuery::new("59", 20)).await.unwrap_err();
    assert!(matches!(
        error,
        GatewayError::Remote {
            kind: RemoteErrorKind::Server,
            status: Some(500),
            ..
        }
    ));
    assert_eq!(gateway.stats().failures, 1);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad query"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = RequestGateway::connect(&test_settings(&mock_server.uri()), &test_credential())
        .expect("Failed to connect gateway");

    let error = gateway.search(&SearchQuery::new("", 20)).await.unwrap_err();
    assert!(matches!(
        error,
        GatewayError::Remote {
            kind: RemoteErrorKind::Client,
            status: Some(400),
            ..
        }
    ));
}

#[tokio::test]
async fn test_undecodable_body_is_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = RequestGateway::connect(&test_settings(&mock_server.uri()), &test_credential())
        .expect("Failed to connect gateway");

    let error = gateway.search(&SearchQuery::new("59", 20)).await.unwrap_err();
    assert!(matches!(
        error,
        GatewayError::Remote {
            kind: RemoteErrorKind::Decode,
            ..
        }
    ));
}

#[tokio::test]
async fn test_concurrency_ceiling_holds_requests_back() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(suggestions(&[]))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&mock_server)
        .await;

    let mut settings = test_settings(&mock_server.uri());
    settings.max_concurrent = 2;
    let gateway = Arc::new(
        RequestGateway::connect(&settings, &test_credential()).expect("Failed to connect gateway"),
    );

    let started = Instant::now();
    let mut handles = Vec::new();
    for i in 0..4 {
        let gateway = Arc::clone(&gateway);
        handles.push(tokio::spawn(async move {
            gateway.search(&SearchQuery::new(format!("{}", i), 20)).await
        }));
    }
    for handle in handles {
        handle.await.expect("Task panicked").expect("Search failed");
    }

    // Four requests, two at a time, 200ms each
    assert!(
        started.elapsed() >= Duration::from_millis(380),
        "requests were not serialized by the ceiling: {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_rate_ceiling_spaces_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(suggestions(&[])))
        .expect(10)
        .mount(&mock_server)
        .await;

    let mut settings = test_settings(&mock_server.uri());
    settings.requests_per_second = 5;
    let gateway =
        RequestGateway::connect(&settings, &test_credential()).expect("Failed to connect gateway");

    let started = Instant::now();
    for i in 0..10 {
        gateway
            .search(&SearchQuery::new(format!("{}", i), 20))
            .await
            .expect("Search failed");
    }

    // A burst of five, then one every 200ms
    assert!(
        started.elapsed() >= Duration::from_millis(900),
        "rate ceiling not applied: {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_drain_shutdown_lets_in_flight_request_finish() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(suggestions(&["59RS0001"]))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = Arc::new(
        RequestGateway::connect(&test_settings(&mock_server.uri()), &test_credential())
            .expect("Failed to connect gateway"),
    );

    let in_flight = {
        let gateway = Arc::clone(&gateway);
        tokio::spawn(async move { gateway.search(&SearchQuery::new("59", 20)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    gateway.shutdown(ShutdownMode::Drain).await;

    let result = in_flight.await.expect("Task panicked");
    assert_eq!(result.expect("In-flight search failed").entities.len(), 1);

    let after = gateway.search(&SearchQuery::new("60", 20)).await;
    assert!(matches!(after, Err(GatewayError::Closed)));
}

#[tokio::test]
async fn test_discard_shutdown_drops_queued_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(suggestions(&["59RS0001"]))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut settings = test_settings(&mock_server.uri());
    settings.max_concurrent = 1;
    let gateway = Arc::new(
        RequestGateway::connect(&settings, &test_credential()).expect("Failed to connect gateway"),
    );

    let first = {
        let gateway = Arc::clone(&gateway);
        tokio::spawn(async move { gateway.search(&SearchQuery::new("59", 20)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let queued = {
        let gateway = Arc::clone(&gateway);
        tokio::spawn(async move { gateway.search(&SearchQuery::new("60", 20)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    gateway.shutdown(ShutdownMode::Discard).await;

    assert!(first.await.expect("Task panicked").is_ok());
    assert!(matches!(
        queued.await.expect("Task panicked"),
        Err(GatewayError::Closed)
    ));
}

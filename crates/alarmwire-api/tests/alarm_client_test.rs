#![allow(clippy::unwrap_used)]
// Integration tests for `AlarmClient` using wiremock.

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use alarmwire_api::{AlarmClient, AlarmQuery, Error, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, AlarmClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = AlarmClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

fn alarm_json(id: i64, severity: &str) -> serde_json::Value {
    json!({
        "occurrence_id": id,
        "rule_id": 3,
        "tenant_id": 1,
        "device_id": "12",
        "message": format!("alarm {id}"),
        "severity": severity,
        "state": "active",
        "timestamp": "2026-03-01T08:15:00Z"
    })
}

// ── Listing ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_active_alarms() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/alarms/active"))
        .and(query_param("page", "2"))
        .and(query_param("limit", "10"))
        .and(query_param("severity", "critical"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "items": [alarm_json(41, "critical"), alarm_json(42, "CRITICAL")],
                "pagination": { "page": 2, "limit": 10, "total": 12 }
            }
        })))
        .mount(&server)
        .await;

    let query = AlarmQuery {
        page: 2,
        limit: 10,
        severity: Some("critical".into()),
        ..AlarmQuery::default()
    };
    let page = client.list_active_alarms(&query).await.unwrap();

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].occurrence_id, 41);
    assert_eq!(page.total(), 12);
}

#[tokio::test]
async fn test_list_without_pagination_falls_back_to_item_count() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/alarms/active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "items": [alarm_json(1, "low")] }
        })))
        .mount(&server)
        .await;

    let page = client.list_active_alarms(&AlarmQuery::default()).await.unwrap();
    assert!(page.pagination.is_none());
    assert_eq!(page.total(), 1);
}

#[tokio::test]
async fn test_list_unsuccessful_envelope() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/alarms/active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "database unavailable"
        })))
        .mount(&server)
        .await;

    let result = client.list_active_alarms(&AlarmQuery::default()).await;
    match result {
        Err(Error::Api { status, message }) => {
            assert_eq!(status, 200);
            assert_eq!(message, "database unavailable");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_list_unauthorized() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/alarms/active"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let result = client.list_active_alarms(&AlarmQuery::default()).await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_list_server_error_with_html_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/alarms/active"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;

    let result = client.list_active_alarms(&AlarmQuery::default()).await;
    assert!(
        matches!(result, Err(Error::Api { status: 502, .. })),
        "expected Api 502, got: {result:?}"
    );
}

// ── Actions ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_acknowledge_sends_comment() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/alarms/occurrences/42/acknowledge"))
        .and(body_json(json!({ "comment": "on my way" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": null,
            "message": "acknowledged"
        })))
        .expect(1)
        .mount(&server)
        .await;

    client.acknowledge(42, Some("on my way")).await.unwrap();
}

#[tokio::test]
async fn test_clear_without_comment() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/alarms/occurrences/7/clear"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    client.clear(7, None).await.unwrap();
}

#[tokio::test]
async fn test_clear_missing_occurrence() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/alarms/occurrences/999/clear"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false,
            "message": "occurrence not found"
        })))
        .mount(&server)
        .await;

    let err = client.clear(999, None).await.unwrap_err();
    assert!(err.is_not_found(), "expected not-found, got: {err:?}");
}

#[tokio::test]
async fn test_trigger_test_alarm() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/alarms/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": alarm_json(9000, "high")
        })))
        .expect(1)
        .mount(&server)
        .await;

    client.trigger_test_alarm().await.unwrap();
}

// ── Transport config ────────────────────────────────────────────────

#[tokio::test]
async fn test_bearer_token_is_attached() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/alarms/active"))
        .and(header("authorization", "Bearer plant-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "items": [] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let transport = TransportConfig {
        token: Some(secrecy::SecretString::from("plant-token".to_string())),
        ..TransportConfig::default()
    };
    let client = AlarmClient::new(Url::parse(&server.uri()).unwrap(), &transport).unwrap();

    let page = client.list_active_alarms(&AlarmQuery::default()).await.unwrap();
    assert!(page.items.is_empty());
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use em_adapters::FakePublisher;
use em_core::{EventRecord, SequentialIdGen};
use std::collections::HashSet;
use tower::ServiceExt;

const TOPIC: &str = "incoming.event.topic";

const PAYLOAD: &str = r#"{
  "status": "firing",
  "externalURL": "http://alertmanager.example.com:9093",
  "alerts": [
    {"labels": {"alertname": "HighCPU", "severity": "critical"}, "annotations": {"description": "cpu hot"}},
    {"labels": {"alertname": "DiskFull"}},
    {"labels": {"alertname": "NodeDown"}}
  ]
}"#;

fn app(publisher: &FakePublisher) -> Router {
    router(WebhookState::new(
        publisher.clone(),
        Translator::new("customer1", "default"),
        TOPIC,
        SequentialIdGen::default(),
    ))
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let publisher = FakePublisher::new();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = app(&publisher).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn payload_publishes_one_message_per_alert() {
    let publisher = FakePublisher::new();

    let response = app(&publisher)
        .oneshot(post("/webhook", PAYLOAD))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, SUCCESS_BODY);

    let published = publisher.published(TOPIC);
    assert_eq!(published.len(), 3);

    let types: Vec<_> = published
        .iter()
        .map(|m| EventRecord::from_payload(&m.payload).unwrap().event_type)
        .collect();
    assert_eq!(types, ["HighCPU", "DiskFull", "NodeDown"]);

    let first = EventRecord::from_payload(&published[0].payload).unwrap();
    assert_eq!(first.tenant, "customer1");
    assert_eq!(first.site, "alertmanager.example.com");
    assert_eq!(first.message, "cpu hot");
}

#[tokio::test]
async fn every_message_gets_fresh_id_and_correlation_id() {
    let publisher = FakePublisher::new();
    let app = app(&publisher);

    for _ in 0..2 {
        let response = app.clone().oneshot(post("/", PAYLOAD)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let published = publisher.published(TOPIC);
    assert_eq!(published.len(), 6);

    let mut seen = HashSet::new();
    for message in &published {
        let correlation = message.correlation_id().unwrap();
        assert!(seen.insert(message.id.clone()));
        assert!(seen.insert(correlation.to_string()));
    }
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let publisher = FakePublisher::new();

    let response = app(&publisher)
        .oneshot(post("/webhook", "{\"alerts\": ["))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let text = body_text(response).await;
    assert!(text.contains("EOF"), "{}", text);
    assert!(publisher.calls().is_empty());
}

#[tokio::test]
async fn hostless_external_url_rejects_request() {
    let publisher = FakePublisher::new();
    let body = r#"{"externalURL": "", "alerts": [{"labels": {"alertname": "A"}}]}"#;

    let response = app(&publisher).oneshot(post("/webhook", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("no host"));
    assert!(publisher.calls().is_empty());
}

#[tokio::test]
async fn empty_alert_list_succeeds_without_publishing() {
    let publisher = FakePublisher::new();

    let response = app(&publisher)
        .oneshot(post("/webhook", r#"{"status": "resolved", "alerts": []}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(publisher.calls().is_empty());
}

#[tokio::test]
async fn publish_failure_is_a_server_error() {
    let publisher = FakePublisher::new();
    publisher.set_failing(true);

    let response = app(&publisher)
        .oneshot(post("/webhook", PAYLOAD))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.starts_with("publishing events"));
}

#[tokio::test]
async fn get_on_webhook_is_not_allowed() {
    let publisher = FakePublisher::new();
    let request = Request::builder()
        .uri("/webhook")
        .body(Body::empty())
        .unwrap();

    let response = app(&publisher).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

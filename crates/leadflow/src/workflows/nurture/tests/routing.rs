use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use super::common::*;
use crate::workflows::nurture::repository::RecordStore;
use crate::workflows::nurture::router::nurture_router;

async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

fn post(uri: &str, payload: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method("POST").uri(uri);
    match payload {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .expect("request builds"),
        None => builder.body(Body::empty()).expect("request builds"),
    }
}

#[tokio::test]
async fn score_endpoint_returns_the_report() {
    let harness = harness();
    // The router stamps requests with the wall clock, so seed relative to it.
    let now = chrono::Utc::now();
    seed_promotable_lead(&harness, "lead-route", now);
    let app = nurture_router(Arc::new(harness.processor.clone()));

    let response = app
        .oneshot(post("/api/v1/automation/leads/lead-route/score", None))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json_body(response).await;
    assert!(body["total_score"].as_u64().expect("score present") >= 75);
    assert_eq!(body["level"], "warm");
}

#[tokio::test]
async fn unknown_leads_return_not_found() {
    let harness = harness();
    let app = nurture_router(Arc::new(harness.processor.clone()));

    let response = app
        .oneshot(post("/api/v1/automation/leads/nobody/score", None))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = read_json_body(response).await;
    assert!(body["error"].as_str().expect("error present").contains("not found"));
}

#[tokio::test]
async fn compliance_endpoint_reports_every_requirement() {
    let harness = harness();
    let now = fixed_now();
    let lead = sparse_lead("lead-check", now);
    harness
        .store
        .insert_lead(lead)
        .expect("lead inserts");
    let app = nurture_router(Arc::new(harness.processor.clone()));

    let response = app
        .oneshot(get("/api/v1/automation/leads/lead-check/compliance"))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json_body(response).await;
    assert_eq!(body["compliant"], false);
    let failed = body["requirements_failed"]
        .as_array()
        .expect("failures listed");
    assert!(!failed.is_empty());
}

#[tokio::test]
async fn engagement_endpoint_applies_the_delta() {
    let harness = harness();
    let now = fixed_now();
    let lead = sparse_lead("lead-event", now);
    harness.store.insert_lead(lead).expect("lead inserts");
    let app = nurture_router(Arc::new(harness.processor.clone()));

    let response = app
        .oneshot(post(
            "/api/v1/automation/engagement",
            Some(json!({ "lead_id": "lead-event", "event_type": "form_submit" })),
        ))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json_body(response).await;
    assert_eq!(body["score_change"], 30, "fresh form submit gets the recency bonus");
    assert_eq!(body["new_score"], 30);
}

#[tokio::test]
async fn sequence_endpoint_starts_the_tier_flavor() {
    let harness = harness();
    let now = fixed_now();
    let lead = sparse_lead("lead-seq-api", now);
    harness.store.insert_lead(lead).expect("lead inserts");
    let app = nurture_router(Arc::new(harness.processor.clone()));

    let response = app
        .oneshot(post(
            "/api/v1/automation/sequences",
            Some(json!({ "lead_id": "lead-seq-api" })),
        ))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = read_json_body(response).await;
    assert_eq!(body["kind"], "basic_nurture");
    assert_eq!(body["total_steps"], 3);
}

#[tokio::test]
async fn call_endpoint_rejects_unqualified_leads() {
    let harness = harness();
    let now = fixed_now();
    let lead = sparse_lead("lead-notwarm", now);
    harness.store.insert_lead(lead).expect("lead inserts");
    let app = nurture_router(Arc::new(harness.processor.clone()));

    let response = app
        .oneshot(post(
            "/api/v1/automation/calls",
            Some(json!({ "lead_id": "lead-notwarm" })),
        ))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn queue_endpoints_process_and_summarize() {
    let harness = harness();
    let now = fixed_now();
    let lead = sparse_lead("lead-queue-api", now);
    let lead_id = lead.id.clone();
    harness.store.insert_lead(lead).expect("lead inserts");
    harness
        .service
        .start_sequence(&lead_id, now)
        .expect("sequence starts");
    let app = nurture_router(Arc::new(harness.processor.clone()));

    let response = app
        .clone()
        .oneshot(post("/api/v1/automation/tasks/process", None))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["processed"], 1);
    assert_eq!(body["succeeded"], 1);

    let response = app
        .oneshot(get("/api/v1/automation/tasks/status"))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["by_status"]["completed"], 1);
    assert_eq!(body["by_status"]["pending"], 1, "the follow-up step is queued");
}

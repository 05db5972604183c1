//! Integration tests for DogSquad API endpoints.
//!
//! These tests verify the full request/response cycle through the HTTP API,
//! including the report lifecycle, the append-only timeline, and the alert
//! records.

use axum_test::TestServer;
use serde_json::json;

use dogsquad::api::{AppState, router};
use dogsquad::images::HttpImageStore;
use dogsquad::storage::Storage;

async fn create_test_server() -> TestServer {
    create_test_server_with_images(None).await
}

async fn create_test_server_with_images(images: Option<HttpImageStore>) -> TestServer {
    let storage = Storage::new("sqlite::memory:").await.unwrap();
    let state = AppState { storage, images };
    TestServer::new(router(state)).unwrap()
}

fn injured_dog_report() -> serde_json::Value {
    json!({
        "user_id": "user-1",
        "issue_type": "injured",
        "title": "Injured dog near gate",
        "description": "Limping, right front leg",
        "latitude": 12.9352,
        "longitude": 77.6146,
        "location_address": "Koramangala, Bangalore"
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server().await;

    let response = server.get("/health").await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_submit_report_creates_pending_with_one_timeline_entry() {
    let server = create_test_server().await;

    let response = server.post("/reports").json(&injured_dog_report()).await;

    response.assert_status(axum::http::StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "pending");
    assert!(body["image_url"].is_null());
    let report_id = body["report_id"].as_i64().unwrap();

    // The report is readable and pending.
    let response = server.get(&format!("/reports/{report_id}")).await;
    response.assert_status_ok();
    let report: serde_json::Value = response.json();
    assert_eq!(report["issue_type"], "injured");
    assert_eq!(report["status"], "pending");
    assert_eq!(report["latitude"], 12.9352);

    // Exactly one timeline entry, the submission record.
    let response = server.get(&format!("/reports/{report_id}/timeline")).await;
    response.assert_status_ok();
    let timeline: serde_json::Value = response.json();
    let entries = timeline["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["action"], "Report submitted");
    assert_eq!(entries[0]["report_id"], report_id);
}

#[tokio::test]
async fn test_submit_without_location_is_rejected_and_writes_nothing() {
    let server = create_test_server().await;

    let response = server
        .post("/reports")
        .json(&json!({
            "user_id": "user-1",
            "issue_type": "feeding",
            "title": "Hungry dogs behind the market"
        }))
        .await;

    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("location"));

    // No row was written.
    server
        .get("/reports/1")
        .await
        .assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_submit_with_partial_location_is_rejected() {
    let server = create_test_server().await;

    let mut request = injured_dog_report();
    request["longitude"] = serde_json::Value::Null;

    let response = server.post("/reports").json(&request).await;

    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_submit_with_empty_title_names_the_field() {
    let server = create_test_server().await;

    let mut request = injured_dog_report();
    request["title"] = json!("   ");

    let response = server.post("/reports").json(&request).await;

    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = response.json();
    assert_eq!(body["field"], "title");
}

#[tokio::test]
async fn test_unknown_issue_type_names_the_field() {
    let server = create_test_server().await;

    let mut request = injured_dog_report();
    request["issue_type"] = json!("hungry");

    let response = server.post("/reports").json(&request).await;

    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = response.json();
    assert_eq!(body["field"], "issue_type");

    // Nothing was written.
    server
        .get("/reports/1")
        .await
        .assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_image_upload_still_creates_report() {
    // Point the image store at a port nothing listens on; uploads fail fast.
    let server =
        create_test_server_with_images(Some(HttpImageStore::new("http://127.0.0.1:1"))).await;

    let mut request = injured_dog_report();
    request["image_base64"] = json!("/9j/4AAQ");
    request["image_filename"] = json!("dog.jpg");

    let response = server.post("/reports").json(&request).await;

    // Submission succeeds even though the upload failed.
    response.assert_status(axum::http::StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert!(body["image_url"].is_null());

    let report_id = body["report_id"].as_i64().unwrap();
    let report: serde_json::Value = server.get(&format!("/reports/{report_id}")).await.json();
    assert_eq!(report["status"], "pending");
    assert!(report["image_url"].is_null());
}

#[tokio::test]
async fn test_get_unknown_report() {
    let server = create_test_server().await;

    server
        .get("/reports/999")
        .await
        .assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_status_lifecycle_over_http() {
    let server = create_test_server().await;

    let body: serde_json::Value = server.post("/reports").json(&injured_dog_report()).await.json();
    let report_id = body["report_id"].as_i64().unwrap();
    let status_url = format!("/reports/{report_id}/status");

    // pending -> in_progress
    let response = server
        .patch(&status_url)
        .json(&json!({"actor_id": "vol-7", "status": "in_progress"}))
        .await;
    response.assert_status_ok();
    let report: serde_json::Value = response.json();
    assert_eq!(report["status"], "in_progress");

    // in_progress -> resolved, with resolution details
    let response = server
        .patch(&status_url)
        .json(&json!({
            "actor_id": "vol-7",
            "status": "resolved",
            "resolution_notes": "Taken to the vet, recovering"
        }))
        .await;
    response.assert_status_ok();
    let report: serde_json::Value = response.json();
    assert_eq!(report["status"], "resolved");
    assert_eq!(report["resolution_notes"], "Taken to the vet, recovering");
    assert!(!report["resolved_at"].is_null());

    // resolved -> pending is illegal and changes nothing
    let response = server
        .patch(&status_url)
        .json(&json!({"actor_id": "vol-7", "status": "pending"}))
        .await;
    response.assert_status(axum::http::StatusCode::CONFLICT);

    let report: serde_json::Value = server.get(&format!("/reports/{report_id}")).await.json();
    assert_eq!(report["status"], "resolved");

    // Each successful change appended an audit entry after the submission one.
    let timeline: serde_json::Value =
        server.get(&format!("/reports/{report_id}/timeline")).await.json();
    let entries = timeline["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["action"], "Report submitted");
    assert_eq!(entries[1]["action"], "Status changed to in progress");
    assert_eq!(entries[2]["action"], "Report resolved");
}

#[tokio::test]
async fn test_skipping_a_lifecycle_stage_is_rejected() {
    let server = create_test_server().await;

    let body: serde_json::Value = server.post("/reports").json(&injured_dog_report()).await.json();
    let report_id = body["report_id"].as_i64().unwrap();

    let response = server
        .patch(&format!("/reports/{report_id}/status"))
        .json(&json!({"actor_id": "vol-7", "status": "resolved"}))
        .await;

    response.assert_status(axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_administrative_close_from_pending() {
    let server = create_test_server().await;

    let body: serde_json::Value = server.post("/reports").json(&injured_dog_report()).await.json();
    let report_id = body["report_id"].as_i64().unwrap();

    let response = server
        .patch(&format!("/reports/{report_id}/status"))
        .json(&json!({"actor_id": "admin-1", "status": "closed"}))
        .await;

    response.assert_status_ok();
    let report: serde_json::Value = response.json();
    assert_eq!(report["status"], "closed");
}

#[tokio::test]
async fn test_alert_dispatch_and_response() {
    let server = create_test_server().await;

    let body: serde_json::Value = server.post("/reports").json(&injured_dog_report()).await.json();
    let report_id = body["report_id"].as_i64().unwrap();
    let alerts_url = format!("/reports/{report_id}/alerts");

    // Dispatch to two volunteers.
    let response = server
        .post(&alerts_url)
        .json(&json!({"volunteer_ids": ["vol-1", "vol-2"]}))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    let alerts = body["alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 2);
    assert!(alerts.iter().all(|a| a["status"] == "sent"));
    let alert_id = alerts[0]["id"].as_i64().unwrap();

    // Re-dispatching the same volunteer creates nothing new.
    let response = server
        .post(&alerts_url)
        .json(&json!({"volunteer_ids": ["vol-1"]}))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert!(body["alerts"].as_array().unwrap().is_empty());

    // First response wins.
    let response = server
        .post(&format!("/alerts/{alert_id}/response"))
        .json(&json!({"status": "accepted", "notes": "On my way"}))
        .await;
    response.assert_status_ok();
    let alert: serde_json::Value = response.json();
    assert_eq!(alert["status"], "accepted");
    assert!(!alert["responded_at"].is_null());

    // A second outcome is rejected.
    let response = server
        .post(&format!("/alerts/{alert_id}/response"))
        .json(&json!({"status": "declined"}))
        .await;
    response.assert_status(axum::http::StatusCode::CONFLICT);

    // The recorded outcome stands.
    let body: serde_json::Value = server.get(&alerts_url).await.json();
    let alerts = body["alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0]["status"], "accepted");
    assert_eq!(alerts[1]["status"], "sent");
}

#[tokio::test]
async fn test_rejected_alert_batch_writes_nothing() {
    let server = create_test_server().await;

    let body: serde_json::Value = server.post("/reports").json(&injured_dog_report()).await.json();
    let report_id = body["report_id"].as_i64().unwrap();
    let alerts_url = format!("/reports/{report_id}/alerts");

    // A blank id anywhere in the batch rejects the whole dispatch.
    let response = server
        .post(&alerts_url)
        .json(&json!({"volunteer_ids": ["vol-1", "  "]}))
        .await;
    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);

    // Not even the valid volunteer was alerted.
    let body: serde_json::Value = server.get(&alerts_url).await.json();
    assert!(body["alerts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_alerts_for_unknown_report() {
    let server = create_test_server().await;

    let response = server
        .post("/reports/999/alerts")
        .json(&json!({"volunteer_ids": ["vol-1"]}))
        .await;

    response.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_timeline_listing_is_idempotent() {
    let server = create_test_server().await;

    let body: serde_json::Value = server.post("/reports").json(&injured_dog_report()).await.json();
    let report_id = body["report_id"].as_i64().unwrap();
    let timeline_url = format!("/reports/{report_id}/timeline");

    let first: serde_json::Value = server.get(&timeline_url).await.json();
    let second: serde_json::Value = server.get(&timeline_url).await.json();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_full_workflow() {
    let server = create_test_server().await;

    // 1. Health check
    server.get("/health").await.assert_status_ok();

    // 2. A reporter submits an injured-dog report.
    let body: serde_json::Value = server.post("/reports").json(&injured_dog_report()).await.json();
    let report_id = body["report_id"].as_i64().unwrap();

    // 3. The dispatcher records alerts for nearby volunteers.
    let body: serde_json::Value = server
        .post(&format!("/reports/{report_id}/alerts"))
        .json(&json!({"volunteer_ids": ["vol-1", "vol-2", "vol-3"]}))
        .await
        .json();
    let alerts = body["alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 3);

    // 4. One volunteer accepts, another declines.
    server
        .post(&format!("/alerts/{}/response", alerts[0]["id"]))
        .json(&json!({"status": "accepted"}))
        .await
        .assert_status_ok();
    server
        .post(&format!("/alerts/{}/response", alerts[1]["id"]))
        .json(&json!({"status": "declined", "notes": "Out of town"}))
        .await
        .assert_status_ok();

    // 5. The report moves through its lifecycle.
    for (status, extra) in [
        ("in_progress", json!({})),
        ("resolved", json!({"resolution_notes": "Treated on site"})),
        ("closed", json!({})),
    ] {
        let mut request = json!({"actor_id": "vol-1", "status": status});
        for (k, v) in extra.as_object().unwrap() {
            request[k] = v.clone();
        }
        server
            .patch(&format!("/reports/{report_id}/status"))
            .json(&request)
            .await
            .assert_status_ok();
    }

    let report: serde_json::Value = server.get(&format!("/reports/{report_id}")).await.json();
    assert_eq!(report["status"], "closed");

    // 6. The timeline recorded every step, oldest first.
    let timeline: serde_json::Value =
        server.get(&format!("/reports/{report_id}/timeline")).await.json();
    let entries = timeline["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0]["action"], "Report submitted");
    assert_eq!(entries[3]["action"], "Report closed");
}

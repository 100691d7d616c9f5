//! Integration tests for the notification backlog and health endpoints.

mod common;

use std::sync::Arc;

use http::StatusCode;

use civicpulse_core::types::id::{ReportId, UserId};
use civicpulse_database::NotificationStore;
use civicpulse_entity::notification::{NewNotification, NotificationKind};
use civicpulse_entity::user::UserRole;
use civicpulse_realtime::Topic;
use civicpulse_worker::MemoryEventSource;

use common::TestApp;

async fn seed(app: &TestApp, user: i64, count: usize) {
    for i in 0..count {
        app.store
            .save(&NewNotification::new(
                UserId(user),
                NotificationKind::StatusUpdate,
                "Report Status Updated",
                format!("update {i}"),
                Some(ReportId(42)),
            ))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_list_requires_token() {
    let app = TestApp::new();
    let response = app.request("GET", "/api/notifications", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let app = TestApp::new();
    let token = common::token_for(7, UserRole::Citizen, chrono::Utc::now().timestamp() - 3600);
    let response = app.request("GET", "/api/notifications", Some(&token)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_is_paginated_and_scoped_to_caller() {
    let app = TestApp::new();
    seed(&app, 7, 3).await;
    seed(&app, 8, 2).await;
    let token = app.token(7, UserRole::Citizen);

    let response = app
        .request("GET", "/api/notifications?limit=2&offset=0", Some(&token))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let data = &response.body["data"];
    assert_eq!(data["items"].as_array().unwrap().len(), 2);
    assert_eq!(data["total"], 3);
    assert_eq!(data["unread"], 3);
    assert_eq!(data["has_more"], true);
    assert!(
        data["items"]
            .as_array()
            .unwrap()
            .iter()
            .all(|n| n["user_id"] == 7)
    );
}

#[tokio::test]
async fn test_mark_read_updates_counts() {
    let app = TestApp::new();
    seed(&app, 7, 2).await;
    let token = app.token(7, UserRole::Citizen);
    let first_id = app.store.all().await[0].id.get();

    let response = app
        .request(
            "PUT",
            &format!("/api/notifications/{first_id}/read"),
            Some(&token),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["count"], 1);

    let response = app
        .request("GET", "/api/notifications/unread-count", Some(&token))
        .await;
    assert_eq!(response.body["data"]["count"], 1);
}

#[tokio::test]
async fn test_mark_read_of_foreign_notification_is_not_found() {
    let app = TestApp::new();
    seed(&app, 8, 1).await;
    let token = app.token(7, UserRole::Citizen);
    let foreign_id = app.store.all().await[0].id.get();

    let response = app
        .request(
            "PUT",
            &format!("/api/notifications/{foreign_id}/read"),
            Some(&token),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(app.store.count_unread(UserId(8)).await.unwrap(), 1);
}

#[tokio::test]
async fn test_mark_all_read() {
    let app = TestApp::new();
    seed(&app, 7, 4).await;
    let token = app.token(7, UserRole::Citizen);

    let response = app
        .request("PUT", "/api/notifications/read-all", Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["marked"], 4);
    assert_eq!(app.store.count_unread(UserId(7)).await.unwrap(), 0);
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new();

    let response = app.request("GET", "/api/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "ok");

    let response = app.request("GET", "/api/health/detailed", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["database"], "in_memory");
    assert!(response.body["data"]["metrics"]["connections_active"].is_number());
}

#[tokio::test]
async fn test_ready_once_consumers_attach() {
    let app = TestApp::new();

    let response = app.request("GET", "/api/health/ready", None).await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);

    app.state.consumers.spawn(
        Topic::StatusChange,
        Arc::new(MemoryEventSource::new("report.status_change")),
    );
    let mut status = StatusCode::SERVICE_UNAVAILABLE;
    for _ in 0..100 {
        status = app.request("GET", "/api/health/ready", None).await.status;
        if status == StatusCode::OK {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(status, StatusCode::OK);

    app.state
        .consumers
        .shutdown(std::time::Duration::from_secs(1))
        .await;
}

#[tokio::test]
async fn test_ws_without_token_is_unauthorized() {
    let app = TestApp::new();
    let response = app.request("GET", "/ws", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wait_returns_submission_outcome() {
    let app = TestApp::new();
    let pending = app.spawn_request("GET", "/api/notifications/wait?request_id=req-77");

    for _ in 0..100 {
        if app.state.realtime.waiters.is_waiting("req-77") {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    assert!(app.state.realtime.waiters.is_waiting("req-77"));

    app.state
        .realtime
        .process(
            Topic::Submission,
            Some("5-0"),
            br#"{"RequestID":"req-77","Status":"success","Message":"stored"}"#,
        )
        .await;

    let response = pending.await.unwrap();
    assert_eq!(response.status, StatusCode::OK);
    let data = &response.body["data"];
    assert_eq!(data["status"], "done");
    assert_eq!(data["request_id"], "req-77");
    assert_eq!(data["event"]["status"], "success");
    assert!(app.state.realtime.waiters.is_empty());
}

#[tokio::test]
async fn test_wait_times_out_as_queued() {
    let app = TestApp::new();
    let response = app
        .request("GET", "/api/notifications/wait?request_id=req-78", None)
        .await;

    assert_eq!(response.status, StatusCode::ACCEPTED);
    let data = &response.body["data"];
    assert_eq!(data["status"], "queued");
    assert_eq!(data["timeout_ms"], common::WAIT_TIMEOUT_MS);
    assert!(data.get("event").is_none());
    assert!(app.state.realtime.waiters.is_empty());
}

#[tokio::test]
async fn test_wait_requires_request_id() {
    let app = TestApp::new();
    let response = app
        .request("GET", "/api/notifications/wait?request_id=%20", None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_ws_refused_after_shutdown() {
    let app = TestApp::new();
    let token = app.token(7, UserRole::Citizen);
    app.state.realtime.shutdown();

    let response = app.request("GET", &format!("/ws?token={token}"), None).await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
}

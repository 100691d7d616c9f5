//! Shared test helpers for API integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use http::{Request, StatusCode};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::Value;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use civicpulse_api::{AppState, build_router};
use civicpulse_auth::{Claims, JwtDecoder};
use civicpulse_core::config::AppConfig;
use civicpulse_core::types::id::UserId;
use civicpulse_database::{MemoryNotificationStore, MemoryStaffDirectory};
use civicpulse_entity::user::UserRole;
use civicpulse_realtime::RealtimeEngine;
use civicpulse_worker::ConsumerFleet;

pub const SECRET: &str = "test-secret";

/// Submission wait used by the test config.
pub const WAIT_TIMEOUT_MS: u64 = 500;

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Shared state, for direct access to the engine and consumers
    pub state: AppState,
    /// Backing notification store
    pub store: Arc<MemoryNotificationStore>,
    /// Backing staff directory
    pub directory: Arc<MemoryStaffDirectory>,
}

/// Response captured from a test request
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    /// Create a new test application on in-memory gateways
    pub fn new() -> Self {
        let config = AppConfig::from_toml(&format!(
            r#"
            [database]
            url = "postgres://unused/test"

            [auth]
            jwt_secret = "{SECRET}"
            check_revocation = false

            [realtime]
            ping_interval_seconds = 0

            [notifications]
            wait_timeout_ms = {WAIT_TIMEOUT_MS}
            "#
        ))
        .expect("test config");
        let config = Arc::new(config);

        let store = Arc::new(MemoryNotificationStore::new());
        let directory = Arc::new(MemoryStaffDirectory::new());
        let realtime = RealtimeEngine::new(
            &config.realtime,
            &config.notifications,
            store.clone(),
            directory.clone(),
        );
        let consumers = Arc::new(ConsumerFleet::new(realtime.clone(), config.streams.clone()));
        let jwt_decoder = Arc::new(JwtDecoder::new(&config.auth));

        let state = AppState::new(config, None, jwt_decoder, realtime, consumers);
        Self {
            router: build_router(state.clone()),
            state,
            store,
            directory,
        }
    }

    /// Issue a valid access token
    pub fn token(&self, user_id: i64, role: UserRole) -> String {
        token_for(user_id, role, chrono::Utc::now().timestamp() + 3600)
    }

    /// Send a request through the router
    pub async fn request(&self, method: &str, uri: &str, token: Option<&str>) -> TestResponse {
        send(self.router.clone(), method, uri, token).await
    }

    /// Send a request on a background task, for handlers that hold the
    /// request open
    pub fn spawn_request(&self, method: &str, uri: &str) -> JoinHandle<TestResponse> {
        let router = self.router.clone();
        let method = method.to_string();
        let uri = uri.to_string();
        tokio::spawn(async move { send(router, &method, &uri, None).await })
    }
}

async fn send(router: Router, method: &str, uri: &str, token: Option<&str>) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let response = router
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    TestResponse { status, body }
}

/// Sign a token with the test secret
pub fn token_for(user_id: i64, role: UserRole, exp: i64) -> String {
    let claims = Claims {
        user_id: UserId(user_id),
        role,
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

//! Health check handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::dto::response::{
    ApiResponse, DetailedHealthResponse, HealthResponse, ReadinessResponse,
};
use crate::state::AppState;

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}

/// GET /api/health/ready: 503 until every upstream consumer is attached.
pub async fn ready(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<ReadinessResponse>>) {
    let ready = state.consumers.is_ready();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ApiResponse::ok(ReadinessResponse {
            ready,
            consumers: state.consumers.statuses(),
        })),
    )
}

/// GET /api/health/detailed
pub async fn health_detailed(
    State(state): State<AppState>,
) -> Json<ApiResponse<DetailedHealthResponse>> {
    let database = match &state.database {
        Some(db) => match db.ping().await {
            Ok(()) => "connected".to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Database ping failed");
                "unreachable".to_string()
            }
        },
        None => "in_memory".to_string(),
    };
    let ready = state.consumers.is_ready();

    Json(ApiResponse::ok(DetailedHealthResponse {
        status: if ready && database != "unreachable" {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        database,
        ws_connections: state.realtime.registry.connection_count(),
        online_users: state.realtime.registry.user_count(),
        metrics: state.realtime.metrics.snapshot(),
        consumers: state.consumers.statuses(),
    }))
}

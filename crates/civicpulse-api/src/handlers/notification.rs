//! Notification backlog and submission wait handlers.

use std::time::Duration;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use civicpulse_core::error::AppError;
use civicpulse_core::types::id::{NotificationId, UserId};

use crate::dto::response::{
    ApiResponse, CountResponse, MarkedResponse, NotificationListResponse, SubmissionWaitResponse,
};
use crate::error::ApiError;
use crate::extractors::{AuthUser, PaginationParams};
use crate::state::AppState;

/// GET /api/notifications?limit&offset
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<NotificationListResponse>>, ApiError> {
    let page = params.into_page_request(state.config.notifications.max_page_size);
    let store = state.store();
    let user_id = auth.user_id();

    let items = store.list_by_user(user_id, &page).await?;
    let total = store.count_total(user_id).await?;
    let unread = store.count_unread(user_id).await?;

    Ok(Json(ApiResponse::ok(NotificationListResponse {
        has_more: page.offset + (items.len() as u64) < total,
        items,
        total,
        unread,
        limit: page.limit,
        offset: page.offset,
    })))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<CountResponse>>, ApiError> {
    let count = state.store().count_unread(auth.user_id()).await?;
    Ok(Json(ApiResponse::ok(CountResponse { count })))
}

/// PUT /api/notifications/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<CountResponse>>, ApiError> {
    let user_id = auth.user_id();
    let changed = state.store().mark_read(NotificationId(id), user_id).await?;
    if !changed {
        return Err(AppError::not_found(format!("Notification {id} not found")).into());
    }

    let count = state.store().count_unread(user_id).await?;
    push_unread(&state, user_id).await;
    Ok(Json(ApiResponse::ok(CountResponse { count })))
}

/// PUT /api/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<MarkedResponse>>, ApiError> {
    let user_id = auth.user_id();
    let marked = state.store().mark_all_read(user_id).await?;
    if marked > 0 {
        push_unread(&state, user_id).await;
    }
    Ok(Json(ApiResponse::ok(MarkedResponse { marked })))
}

/// Query for a submission wait.
#[derive(Debug, Default, Deserialize)]
pub struct WaitQuery {
    /// Correlation id returned when the submission was queued.
    pub request_id: Option<String>,
}

/// GET /api/notifications/wait?request_id
///
/// Holds the request until the submission outcome for `request_id` arrives
/// (200, `done`) or the configured wait elapses (202, `queued`).
pub async fn wait_for_submission(
    State(state): State<AppState>,
    Query(query): Query<WaitQuery>,
) -> Result<(StatusCode, Json<ApiResponse<SubmissionWaitResponse>>), ApiError> {
    let request_id = query
        .request_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::validation("request_id is required"))?
        .to_string();
    let timeout_ms = state.config.notifications.wait_timeout_ms;

    let mut wait = state.realtime.waiters.register(&request_id);
    let outcome = tokio::time::timeout(Duration::from_millis(timeout_ms), wait.outcome())
        .await
        .ok()
        .flatten();

    let (status, body) = match outcome {
        Some(event) => (
            StatusCode::OK,
            SubmissionWaitResponse {
                status: "done",
                request_id,
                event: Some(event),
                timeout_ms: None,
            },
        ),
        None => (
            StatusCode::ACCEPTED,
            SubmissionWaitResponse {
                status: "queued",
                request_id,
                event: None,
                timeout_ms: Some(timeout_ms),
            },
        ),
    };
    Ok((status, Json(ApiResponse::ok(body))))
}

/// Keep the user's other open tabs in sync after a read-state change.
async fn push_unread(state: &AppState, user_id: UserId) {
    if state.config.realtime.push_unread_count {
        state.realtime.router.refresh_unread_count(user_id).await;
    }
}

//! WebSocket upgrade handler.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures::{StreamExt, future};
use serde::Deserialize;
use tracing::{info, warn};

use civicpulse_auth::Claims;
use civicpulse_core::error::AppError;
use civicpulse_realtime::connection::InboundFrame;

use crate::error::ApiError;
use crate::state::AppState;

/// Query parameter for WebSocket authentication.
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// JWT access token. Browsers cannot set headers on an upgrade request.
    pub token: Option<String>,
}

/// GET /ws?token={jwt}
///
/// The token is verified before the upgrade is accepted. An
/// `Authorization: Bearer` header is accepted as well.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let claims = match authenticate(&state, query, &headers).await {
        Ok(claims) => claims,
        Err(e) => return e.into_response(),
    };
    if state.realtime.is_shutting_down() {
        return ApiError::from(AppError::service_unavailable("Server is shutting down")).into_response();
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    ws.on_upgrade(move |socket| handle_ws_connection(state, claims, socket))
}

async fn authenticate(
    state: &AppState,
    query: WsQuery,
    headers: &HeaderMap,
) -> Result<Claims, ApiError> {
    let token = query
        .token
        .filter(|t| !t.is_empty())
        .or_else(|| {
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::to_string)
        })
        .ok_or_else(|| AppError::authentication("Missing access token"))?;

    Ok(state.jwt_decoder.decode(&token).await?)
}

/// Handles an established WebSocket connection.
async fn handle_ws_connection(state: AppState, claims: Claims, socket: WebSocket) {
    let (subscriber, queue) = match state.realtime.connect(claims.user_id, claims.role).await {
        Ok(connected) => connected,
        Err(e) => {
            warn!(user_id = %claims.user_id, error = %e, "WebSocket refused after upgrade");
            return;
        }
    };
    let conn_id = subscriber.id;

    info!(
        conn_id = %conn_id,
        user_id = %claims.user_id,
        role = %claims.role,
        department_id = ?subscriber.department_id,
        "WebSocket connection established"
    );

    let (ws_tx, ws_rx) = socket.split();
    let sink = futures::SinkExt::with(ws_tx, |text: String| {
        future::ready(Ok::<_, axum::Error>(Message::Text(text.into())))
    });
    let stream = ws_rx.map(|result| {
        result.map(|message| match message {
            Message::Text(text) => InboundFrame::Text(text.as_str().to_owned()),
            Message::Close(_) => InboundFrame::Close,
            _ => InboundFrame::Other,
        })
    });

    state.realtime.serve(subscriber, queue, sink, stream).await;

    info!(
        conn_id = %conn_id,
        user_id = %claims.user_id,
        "WebSocket connection closed"
    );
}

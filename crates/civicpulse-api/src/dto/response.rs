//! Response DTOs.

use serde::{Deserialize, Serialize};

use civicpulse_entity::event::SubmissionEvent;
use civicpulse_entity::notification::Notification;
use civicpulse_realtime::metrics::MetricsSnapshot;
use civicpulse_worker::ConsumerStatus;

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// One page of a user's notification backlog.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationListResponse {
    /// Newest first.
    pub items: Vec<Notification>,
    /// All notifications of the user.
    pub total: u64,
    /// Unread notifications of the user.
    pub unread: u64,
    /// Page size used.
    pub limit: u64,
    /// Offset used.
    pub offset: u64,
    /// Whether more items follow this page.
    pub has_more: bool,
}

/// Simple count response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

/// Result of a mark-all-read call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkedResponse {
    /// Notifications changed from unread to read.
    pub marked: u64,
}

/// Result of waiting on a submission outcome.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionWaitResponse {
    /// `done` once the outcome arrived, `queued` on timeout.
    pub status: &'static str,
    /// The request id waited on.
    pub request_id: String,
    /// The outcome, when it arrived in time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<SubmissionEvent>,
    /// How long the server waited, on timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status.
    pub status: String,
    /// Version.
    pub version: String,
    /// Uptime.
    pub uptime_seconds: u64,
}

/// Readiness response.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// Whether every consumer is attached.
    pub ready: bool,
    /// Per-consumer state.
    pub consumers: Vec<ConsumerStatus>,
}

/// Detailed health response.
#[derive(Debug, Clone, Serialize)]
pub struct DetailedHealthResponse {
    /// Overall status.
    pub status: String,
    /// Database status.
    pub database: String,
    /// Live push connections.
    pub ws_connections: usize,
    /// Users with at least one live connection.
    pub online_users: usize,
    /// Engine counters.
    pub metrics: MetricsSnapshot,
    /// Per-consumer state.
    pub consumers: Vec<ConsumerStatus>,
}

//! Real-time push and notification delivery configuration.

use serde::{Deserialize, Serialize};

use crate::types::id::UserId;

/// What a subscriber's outbound queue does when it is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Drop the message for that one connection and count a failed delivery.
    #[default]
    DropNewest,
    /// Treat the connection as dead and evict it.
    Disconnect,
}

/// Real-time (WebSocket) push configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Capacity of each subscriber's outbound queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Policy applied when an outbound queue is full.
    #[serde(default)]
    pub backpressure: BackpressurePolicy,
    /// Interval between server pings in seconds (0 disables pings).
    #[serde(default = "default_ping_interval")]
    pub ping_interval_seconds: u64,
    /// Whether recipients get an `unread_count` frame after each delivery.
    #[serde(default = "default_true")]
    pub push_unread_count: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            backpressure: BackpressurePolicy::default(),
            ping_interval_seconds: default_ping_interval(),
            push_unread_count: true,
        }
    }
}

/// Notification ingestion and listing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Window in milliseconds within which a redelivered stream message
    /// is acknowledged without being dispatched again.
    #[serde(default = "default_dedup_window")]
    pub dedup_window_ms: u64,
    /// Maximum page size on the listing endpoint.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,
    /// Recipient used when an event carries no recipient. Unset means such
    /// events are rejected.
    #[serde(default)]
    pub fallback_recipient: Option<UserId>,
    /// How long `GET /api/notifications/wait` holds a request open for a
    /// submission outcome before answering `queued`.
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_ms: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            dedup_window_ms: default_dedup_window(),
            max_page_size: default_max_page_size(),
            fallback_recipient: None,
            wait_timeout_ms: default_wait_timeout(),
        }
    }
}

fn default_queue_capacity() -> usize {
    256
}

fn default_ping_interval() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_dedup_window() -> u64 {
    60_000
}

fn default_max_page_size() -> u64 {
    100
}

fn default_wait_timeout() -> u64 {
    5_000
}

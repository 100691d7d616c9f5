//! Inbound and outbound push message type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use civicpulse_core::types::id::{DepartmentId, NotificationId, ReportId};
use civicpulse_entity::notification::{NewNotification, Notification, NotificationKind};

/// Messages sent by the client to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Application-level keepalive; answered with `pong`.
    Ping {
        /// Optional client timestamp, echoed back.
        #[serde(default)]
        timestamp: Option<i64>,
    },
}

/// Messages sent by the server to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// A single-recipient notification.
    Notification {
        /// Store id; absent when persistence failed.
        id: Option<NotificationId>,
        /// Origin of the notification.
        kind: NotificationKind,
        /// Presentation category.
        category: String,
        /// Title.
        title: String,
        /// Body.
        message: String,
        /// Referenced report.
        report_id: Option<ReportId>,
        /// Read flag.
        is_read: bool,
        /// Creation time.
        created_at: DateTime<Utc>,
    },
    /// Live-only department notice; never persisted.
    Announcement {
        /// Origin of the announcement.
        kind: NotificationKind,
        /// Department addressed.
        department_id: DepartmentId,
        /// Title.
        title: String,
        /// Body.
        message: String,
        /// Referenced report.
        report_id: Option<ReportId>,
        /// Server timestamp.
        timestamp: DateTime<Utc>,
    },
    /// Current unread count of the recipient.
    UnreadCount {
        /// Unread notifications.
        count: u64,
    },
    /// Server keepalive.
    Ping {
        /// Server timestamp.
        timestamp: i64,
    },
    /// Reply to a client ping.
    Pong {
        /// Echoed timestamp.
        timestamp: i64,
    },
    /// Error message.
    Error {
        /// Error code.
        code: String,
        /// Error description.
        message: String,
    },
}

impl OutboundMessage {
    /// Frame for a stored notification.
    pub fn notification(n: &Notification) -> Self {
        Self::Notification {
            id: Some(n.id),
            kind: n.kind,
            category: n.kind.category().to_string(),
            title: n.title.clone(),
            message: n.message.clone(),
            report_id: n.report_id,
            is_read: n.is_read,
            created_at: n.created_at,
        }
    }

    /// Frame for a notification whose persistence failed.
    pub fn unsaved(draft: &NewNotification) -> Self {
        Self::Notification {
            id: None,
            kind: draft.kind,
            category: draft.kind.category().to_string(),
            title: draft.title.clone(),
            message: draft.message.clone(),
            report_id: draft.report_id,
            is_read: false,
            created_at: draft.created_at,
        }
    }
}

//! Notification entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use civicpulse_core::types::id::{NotificationId, ReportId, UserId};

use super::kind::NotificationKind;

/// A persisted, single-recipient notification.
///
/// Immutable once stored except for `is_read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Notification {
    /// Store-assigned identifier.
    pub id: NotificationId,
    /// The recipient user.
    pub user_id: UserId,
    /// What produced this notification.
    #[sqlx(try_from = "String")]
    pub kind: NotificationKind,
    /// Notification title.
    pub title: String,
    /// Notification body text.
    pub message: String,
    /// Report this notification refers to, if any.
    pub report_id: Option<ReportId>,
    /// Whether the recipient has read it.
    pub is_read: bool,
    /// When the notification was created.
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Check if the notification has not been read yet.
    pub fn is_unread(&self) -> bool {
        !self.is_read
    }
}

/// A notification that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    /// The single recipient.
    pub user_id: UserId,
    /// What produced this notification.
    pub kind: NotificationKind,
    /// Notification title.
    pub title: String,
    /// Notification body text.
    pub message: String,
    /// Report this notification refers to, if any.
    pub report_id: Option<ReportId>,
    /// Creation time, fixed when the draft is built.
    pub created_at: DateTime<Utc>,
}

impl NewNotification {
    /// Build a draft stamped with the current time.
    pub fn new(
        user_id: UserId,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        report_id: Option<ReportId>,
    ) -> Self {
        Self {
            user_id,
            kind,
            title: title.into(),
            message: message.into(),
            report_id,
            created_at: Utc::now(),
        }
    }

    /// Attach the store-assigned id, producing an unread notification.
    pub fn into_notification(self, id: NotificationId) -> Notification {
        Notification {
            id,
            user_id: self.user_id,
            kind: self.kind,
            title: self.title,
            message: self.message,
            report_id: self.report_id,
            is_read: false,
            created_at: self.created_at,
        }
    }
}

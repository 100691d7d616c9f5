//! Gateway traits consumed by the notification hub.
//!
//! The hub only ever talks to storage through these traits, so the
//! PostgreSQL repositories and the in-memory stores are interchangeable.

use async_trait::async_trait;

use civicpulse_core::result::AppResult;
use civicpulse_core::types::id::{DepartmentId, NotificationId, ReportId, UserId};
use civicpulse_core::types::pagination::PageRequest;
use civicpulse_entity::notification::{NewNotification, Notification};
use civicpulse_entity::user::StaffRef;

/// Durable notification storage.
///
/// Implementations must be safe for concurrent use. A notification is
/// visible to `list_by_user` as soon as `save` returns.
#[async_trait]
pub trait NotificationStore: Send + Sync + std::fmt::Debug + 'static {
    /// Persist a draft and return the stored record with its assigned id.
    async fn save(&self, draft: &NewNotification) -> AppResult<Notification>;

    /// List a user's notifications, newest first.
    async fn list_by_user(&self, user_id: UserId, page: &PageRequest)
    -> AppResult<Vec<Notification>>;

    /// Count all notifications for a user.
    async fn count_total(&self, user_id: UserId) -> AppResult<u64>;

    /// Count unread notifications for a user.
    async fn count_unread(&self, user_id: UserId) -> AppResult<u64>;

    /// Mark one notification read. Returns `false` if no notification with
    /// that id belongs to the user.
    async fn mark_read(&self, id: NotificationId, user_id: UserId) -> AppResult<bool>;

    /// Mark every notification of a user read. Returns the number changed.
    async fn mark_all_read(&self, user_id: UserId) -> AppResult<u64>;
}

/// Read-only view of the organizational directory.
#[async_trait]
pub trait StaffDirectory: Send + Sync + std::fmt::Debug + 'static {
    /// All active staff members of a department.
    async fn find_staff_in_department(&self, department_id: DepartmentId)
    -> AppResult<Vec<StaffRef>>;

    /// Department currently responsible for a report.
    async fn department_for_report(&self, report_id: ReportId) -> AppResult<Option<DepartmentId>>;

    /// Department a user belongs to, if any.
    async fn department_of_user(&self, user_id: UserId) -> AppResult<Option<DepartmentId>>;
}

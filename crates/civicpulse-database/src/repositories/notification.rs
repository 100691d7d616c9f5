//! Notification repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;

use civicpulse_core::error::{AppError, ErrorKind};
use civicpulse_core::result::AppResult;
use civicpulse_core::types::id::{NotificationId, UserId};
use civicpulse_core::types::pagination::PageRequest;
use civicpulse_entity::notification::{NewNotification, Notification};

use crate::gateway::NotificationStore;

const COLUMNS: &str = "id, user_id, kind, title, message, report_id, is_read, created_at";

/// PostgreSQL notification store.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    /// Create a new notification repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn save(&self, draft: &NewNotification) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(&format!(
            "INSERT INTO notifications (user_id, kind, title, message, report_id, is_read, created_at) \
             VALUES ($1, $2, $3, $4, $5, FALSE, $6) RETURNING {COLUMNS}"
        ))
        .bind(draft.user_id)
        .bind(draft.kind.as_str())
        .bind(&draft.title)
        .bind(&draft.message)
        .bind(draft.report_id)
        .bind(draft.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create notification", e))
    }

    async fn list_by_user(
        &self,
        user_id: UserId,
        page: &PageRequest,
    ) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(&format!(
            "SELECT {COLUMNS} FROM notifications WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list notifications", e))
    }

    async fn count_total(&self, user_id: UserId) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count notifications", e)
            })?;
        Ok(count.max(0) as u64)
    }

    async fn count_unread(&self, user_id: UserId) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count unread", e))?;
        Ok(count.max(0) as u64)
    }

    async fn mark_read(&self, id: NotificationId, user_id: UserId) -> AppResult<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to mark read", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, user_id: UserId) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to mark all read", e))?;
        Ok(result.rows_affected())
    }
}

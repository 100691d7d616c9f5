//! Organizational directory queries against the shared platform schema.
//!
//! The `users`, `roles`, `reports`, and `report_categories` tables are owned
//! by the user and report services; this repository only reads them.

use async_trait::async_trait;
use sqlx::PgPool;

use civicpulse_core::error::{AppError, ErrorKind};
use civicpulse_core::result::AppResult;
use civicpulse_core::types::id::{DepartmentId, ReportId, UserId};
use civicpulse_entity::user::StaffRef;

use crate::gateway::StaffDirectory;

/// PostgreSQL staff directory.
#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    pool: PgPool,
}

impl DirectoryRepository {
    /// Create a new directory repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StaffDirectory for DirectoryRepository {
    async fn find_staff_in_department(
        &self,
        department_id: DepartmentId,
    ) -> AppResult<Vec<StaffRef>> {
        sqlx::query_as::<_, StaffRef>(
            "SELECT u.user_id, u.name FROM users u \
             JOIN roles r ON r.role_id = u.role_id \
             WHERE u.department_id = $1 AND r.name = 'government' AND u.is_active = TRUE \
             ORDER BY u.user_id",
        )
        .bind(department_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find department staff", e)
        })
    }

    async fn department_for_report(&self, report_id: ReportId) -> AppResult<Option<DepartmentId>> {
        let row: Option<Option<DepartmentId>> = sqlx::query_scalar(
            "SELECT COALESCE(r.current_department_id, c.department_id) FROM reports r \
             LEFT JOIN report_categories c ON c.report_categories_id = r.report_categories_id \
             WHERE r.report_id = $1",
        )
        .bind(report_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to resolve report department", e)
        })?;
        Ok(row.flatten())
    }

    async fn department_of_user(&self, user_id: UserId) -> AppResult<Option<DepartmentId>> {
        let row: Option<Option<DepartmentId>> =
            sqlx::query_scalar("SELECT department_id FROM users WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to resolve user department", e)
                })?;
        Ok(row.flatten())
    }
}

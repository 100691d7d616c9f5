//! In-memory gateway implementations for tests and single-node dev runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;

use civicpulse_core::error::AppError;
use civicpulse_core::result::AppResult;
use civicpulse_core::types::id::{DepartmentId, NotificationId, ReportId, UserId};
use civicpulse_core::types::pagination::PageRequest;
use civicpulse_entity::notification::{NewNotification, Notification};
use civicpulse_entity::user::StaffRef;

use crate::gateway::{NotificationStore, StaffDirectory};

/// Notification store held in process memory.
///
/// Ids are assigned from a monotonically increasing counter starting at 1.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotificationStore {
    rows: Arc<RwLock<Vec<Notification>>>,
    next_id: Arc<AtomicI64>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryNotificationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored notification, in insertion order.
    pub async fn all(&self) -> Vec<Notification> {
        self.rows.read().await.clone()
    }

    /// Make writes fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn save(&self, draft: &NewNotification) -> AppResult<Notification> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::database("Notification store unavailable"));
        }
        let id = NotificationId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let stored = draft.clone().into_notification(id);
        self.rows.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn list_by_user(
        &self,
        user_id: UserId,
        page: &PageRequest,
    ) -> AppResult<Vec<Notification>> {
        let rows = self.rows.read().await;
        let mut mine: Vec<Notification> =
            rows.iter().filter(|n| n.user_id == user_id).cloned().collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(mine
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn count_total(&self, user_id: UserId) -> AppResult<u64> {
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|n| n.user_id == user_id).count() as u64)
    }

    async fn count_unread(&self, user_id: UserId) -> AppResult<u64> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|n| n.user_id == user_id && n.is_unread())
            .count() as u64)
    }

    async fn mark_read(&self, id: NotificationId, user_id: UserId) -> AppResult<bool> {
        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|n| n.id == id && n.user_id == user_id) {
            Some(n) => {
                n.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: UserId) -> AppResult<u64> {
        let mut rows = self.rows.write().await;
        let mut changed = 0;
        for n in rows.iter_mut().filter(|n| n.user_id == user_id && !n.is_read) {
            n.is_read = true;
            changed += 1;
        }
        Ok(changed)
    }
}

/// Staff directory held in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStaffDirectory {
    staff: Arc<DashMap<DepartmentId, Vec<StaffRef>>>,
    user_departments: Arc<DashMap<UserId, DepartmentId>>,
    report_departments: Arc<DashMap<ReportId, DepartmentId>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStaffDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a staff member to a department.
    pub fn add_staff(&self, department_id: DepartmentId, user_id: UserId, name: &str) {
        self.staff.entry(department_id).or_default().push(StaffRef {
            user_id,
            name: name.to_string(),
        });
        self.user_departments.insert(user_id, department_id);
    }

    /// Record a non-staff user's department.
    pub fn set_user_department(&self, user_id: UserId, department_id: DepartmentId) {
        self.user_departments.insert(user_id, department_id);
    }

    /// Record the department handling a report.
    pub fn set_report_department(&self, report_id: ReportId, department_id: DepartmentId) {
        self.report_departments.insert(report_id, department_id);
    }

    /// Make every lookup fail, simulating a database outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::database("Directory unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl StaffDirectory for MemoryStaffDirectory {
    async fn find_staff_in_department(
        &self,
        department_id: DepartmentId,
    ) -> AppResult<Vec<StaffRef>> {
        self.check()?;
        Ok(self
            .staff
            .get(&department_id)
            .map(|s| s.value().clone())
            .unwrap_or_default())
    }

    async fn department_for_report(&self, report_id: ReportId) -> AppResult<Option<DepartmentId>> {
        self.check()?;
        Ok(self.report_departments.get(&report_id).map(|d| *d.value()))
    }

    async fn department_of_user(&self, user_id: UserId) -> AppResult<Option<DepartmentId>> {
        self.check()?;
        Ok(self.user_departments.get(&user_id).map(|d| *d.value()))
    }
}

//! Report lifecycle events published by the report service.

use serde::{Deserialize, Serialize};

use civicpulse_core::types::id::{DepartmentId, ReportId, UserId};

/// A new report was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportCreatedEvent {
    pub report_id: ReportId,
    /// The reporter.
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub title: String,
    /// Owning department, if the producer already resolved it.
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
    #[serde(default)]
    pub is_anonymous: bool,
}

/// The status of a report changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStatusChangeEvent {
    pub report_id: ReportId,
    #[serde(default)]
    pub old_status: String,
    pub new_status: String,
    #[serde(default)]
    pub changed_by: Option<UserId>,
    /// The original reporter.
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub timestamp: String,
}

/// A report was assigned to a staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportAssignmentEvent {
    pub report_id: ReportId,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    #[serde(default)]
    pub assigned_by: Option<UserId>,
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub timestamp: String,
}

/// A report was escalated from one department to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEscalationEvent {
    pub report_id: ReportId,
    #[serde(default)]
    pub from_department_id: Option<DepartmentId>,
    pub to_department_id: DepartmentId,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub escalated_by: Option<UserId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub timestamp: String,
}

/// Staff posted a response on a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportResponseEvent {
    pub report_id: ReportId,
    #[serde(default)]
    pub response_id: Option<i64>,
    #[serde(default)]
    pub responded_by: Option<UserId>,
    /// The original report creator.
    #[serde(default)]
    pub reporter_id: Option<UserId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub timestamp: String,
}

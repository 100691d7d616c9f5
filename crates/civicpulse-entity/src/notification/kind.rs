//! Notification kind enumeration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use civicpulse_core::AppError;

/// Origin of a notification. Drives presentation (icon/category) and the
/// dispatch rules applied to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A report the user submitted was created.
    ReportCreated,
    /// An asynchronous report submission was stored.
    ReportSuccess,
    /// An asynchronous report submission failed.
    ReportError,
    /// Attached media finished processing.
    MediaCompleted,
    /// Attached media failed processing.
    MediaFailed,
    /// The status of the user's report changed.
    StatusUpdate,
    /// A report was assigned to the staff member.
    ReportAssigned,
    /// A report was escalated to the staff member's department.
    ReportEscalated,
    /// Staff responded to the user's report.
    ReportResponded,
}

impl NotificationKind {
    /// All kinds, in declaration order.
    pub const ALL: [NotificationKind; 9] = [
        Self::ReportCreated,
        Self::ReportSuccess,
        Self::ReportError,
        Self::MediaCompleted,
        Self::MediaFailed,
        Self::StatusUpdate,
        Self::ReportAssigned,
        Self::ReportEscalated,
        Self::ReportResponded,
    ];

    /// Return the kind as its wire/storage string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReportCreated => "report_created",
            Self::ReportSuccess => "report_success",
            Self::ReportError => "report_error",
            Self::MediaCompleted => "media_completed",
            Self::MediaFailed => "media_failed",
            Self::StatusUpdate => "status_update",
            Self::ReportAssigned => "report_assigned",
            Self::ReportEscalated => "report_escalated",
            Self::ReportResponded => "report_responded",
        }
    }

    /// Presentation category used by clients to pick an icon.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ReportCreated | Self::ReportSuccess | Self::ReportError => "report",
            Self::MediaCompleted | Self::MediaFailed => "media",
            Self::StatusUpdate | Self::ReportResponded => "progress",
            Self::ReportAssigned | Self::ReportEscalated => "workload",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| AppError::validation(format!("Unknown notification kind: '{s}'")))
    }
}

impl TryFrom<String> for NotificationKind {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_every_kind() {
        for kind in NotificationKind::ALL {
            assert_eq!(kind.as_str().parse::<NotificationKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_serde_matches_as_str() {
        let json = serde_json::to_string(&NotificationKind::StatusUpdate).unwrap();
        assert_eq!(json, "\"status_update\"");
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!("comment_added".parse::<NotificationKind>().is_err());
    }
}

//! Asynchronous report submission outcome.

use serde::{Deserialize, Serialize};

use civicpulse_core::types::id::{ReportId, UserId};

/// Outcome published by the report worker once a queued submission has been
/// stored or rejected.
///
/// Older producers emit Pascal-cased keys (`RequestID`, `Status`, `Message`);
/// both spellings are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionEvent {
    /// Correlation id of the original submission request.
    #[serde(default, alias = "RequestID")]
    pub request_id: String,
    /// `success` or `error`.
    #[serde(default, alias = "Status")]
    pub status: String,
    /// Worker-supplied detail (`stored`, or the failure reason).
    #[serde(default, alias = "Message")]
    pub message: String,
    /// Submitting user, when the producer includes it.
    #[serde(default, alias = "UserID")]
    pub user_id: Option<UserId>,
    /// Report created by the submission, when known.
    #[serde(default, alias = "ReportID")]
    pub report_id: Option<ReportId>,
}

impl SubmissionEvent {
    /// Whether the submission was stored.
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }

    /// Whether the submission failed.
    pub fn is_error(&self) -> bool {
        self.status.eq_ignore_ascii_case("error")
    }
}

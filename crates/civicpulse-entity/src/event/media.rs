//! Media processing outcome.

use serde::{Deserialize, Serialize};

use civicpulse_core::types::id::{ReportId, UserId};

/// Result of a thumbnail/processing job on uploaded media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaProcessingEvent {
    pub job_id: i64,
    /// `completed`, `failed`, or an intermediate progress state.
    pub status: String,
    #[serde(default)]
    pub original_key: String,
    #[serde(default)]
    pub thumbnail_key: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Uploader, when the producer includes it.
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub report_id: Option<ReportId>,
}

/// Terminal state of a media job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaOutcome {
    Completed,
    Failed,
}

impl MediaProcessingEvent {
    /// Terminal outcome, or `None` for progress acknowledgements.
    pub fn outcome(&self) -> Option<MediaOutcome> {
        match self.status.to_ascii_lowercase().as_str() {
            "completed" => Some(MediaOutcome::Completed),
            "failed" => Some(MediaOutcome::Failed),
            _ => None,
        }
    }
}

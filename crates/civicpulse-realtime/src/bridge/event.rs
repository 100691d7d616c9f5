//! Typed upstream events, one variant per consumed topic.

use std::fmt;

use thiserror::Error;

use civicpulse_entity::event::{
    MediaProcessingEvent, ReportAssignmentEvent, ReportCreatedEvent, ReportEscalationEvent,
    ReportResponseEvent, ReportStatusChangeEvent, SubmissionEvent,
};

/// Logical upstream topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Report submission outcomes.
    Submission,
    /// Media processing outcomes.
    Media,
    /// New reports.
    ReportCreated,
    /// Report status changes.
    StatusChange,
    /// Report assignments.
    Assignment,
    /// Report escalations.
    Escalation,
    /// Staff responses on reports.
    Response,
}

impl Topic {
    /// Every topic the hub consumes.
    pub const ALL: [Topic; 7] = [
        Self::Submission,
        Self::Media,
        Self::ReportCreated,
        Self::StatusChange,
        Self::Assignment,
        Self::Escalation,
        Self::Response,
    ];

    /// Stable name used in logs and health output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submission => "submission",
            Self::Media => "media",
            Self::ReportCreated => "report_created",
            Self::StatusChange => "status_change",
            Self::Assignment => "assignment",
            Self::Escalation => "escalation",
            Self::Response => "response",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-message adapter failures. Never fatal to a consumer.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The payload does not match the topic's schema.
    #[error("malformed {topic} payload: {source}")]
    Malformed {
        topic: Topic,
        #[source]
        source: serde_json::Error,
    },
    /// No recipient could be determined and no fallback is configured.
    #[error("{topic} event has no resolvable recipient ({field} missing)")]
    UnresolvedRecipient { topic: Topic, field: &'static str },
}

/// A parsed upstream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEvent {
    Submission(SubmissionEvent),
    Media(MediaProcessingEvent),
    ReportCreated(ReportCreatedEvent),
    StatusChange(ReportStatusChangeEvent),
    Assignment(ReportAssignmentEvent),
    Escalation(ReportEscalationEvent),
    Response(ReportResponseEvent),
}

impl UpstreamEvent {
    /// Parse a raw payload according to the schema of `topic`.
    pub fn parse(topic: Topic, payload: &[u8]) -> Result<Self, AdapterError> {
        let malformed = |source| AdapterError::Malformed { topic, source };
        let event = match topic {
            Topic::Submission => Self::Submission(serde_json::from_slice(payload).map_err(malformed)?),
            Topic::Media => Self::Media(serde_json::from_slice(payload).map_err(malformed)?),
            Topic::ReportCreated => {
                Self::ReportCreated(serde_json::from_slice(payload).map_err(malformed)?)
            }
            Topic::StatusChange => {
                Self::StatusChange(serde_json::from_slice(payload).map_err(malformed)?)
            }
            Topic::Assignment => Self::Assignment(serde_json::from_slice(payload).map_err(malformed)?),
            Topic::Escalation => Self::Escalation(serde_json::from_slice(payload).map_err(malformed)?),
            Topic::Response => Self::Response(serde_json::from_slice(payload).map_err(malformed)?),
        };
        Ok(event)
    }

    /// Topic this event arrived on.
    pub fn topic(&self) -> Topic {
        match self {
            Self::Submission(_) => Topic::Submission,
            Self::Media(_) => Topic::Media,
            Self::ReportCreated(_) => Topic::ReportCreated,
            Self::StatusChange(_) => Topic::StatusChange,
            Self::Assignment(_) => Topic::Assignment,
            Self::Escalation(_) => Topic::Escalation,
            Self::Response(_) => Topic::Response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dispatches_on_topic() {
        let ev = UpstreamEvent::parse(
            Topic::StatusChange,
            br#"{"report_id":42,"new_status":"resolved","user_id":7}"#,
        )
        .unwrap();
        assert_eq!(ev.topic(), Topic::StatusChange);
    }

    #[test]
    fn test_malformed_payload() {
        let err = UpstreamEvent::parse(Topic::Escalation, b"{\"report_id\":").unwrap_err();
        assert!(matches!(err, AdapterError::Malformed { topic: Topic::Escalation, .. }));
    }
}

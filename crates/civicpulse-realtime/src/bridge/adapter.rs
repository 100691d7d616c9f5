//! Pure mapping from upstream events to notification drafts.
//!
//! Nothing here talks to storage or to the registry. The adapter decides
//! what should be produced; the dispatch router carries it out.

use tracing::warn;

use civicpulse_core::types::id::{DepartmentId, ReportId, UserId};
use civicpulse_entity::event::{
    MediaOutcome, MediaProcessingEvent, ReportAssignmentEvent, ReportCreatedEvent,
    ReportEscalationEvent, ReportResponseEvent, ReportStatusChangeEvent, SubmissionEvent,
};
use civicpulse_entity::notification::{NewNotification, NotificationKind};
use civicpulse_entity::user::StaffRef;

use super::event::{AdapterError, Topic, UpstreamEvent};

/// Live-only notice addressed to a whole department.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub report_id: ReportId,
    pub title: String,
    pub message: String,
}

/// What the router must do for one upstream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchPlan {
    /// The event is an acknowledgement that needs no notification.
    Skip { reason: &'static str },
    /// Persist and push one notification to its recipient.
    Direct(NewNotification),
    /// A new report: confirm to the reporter and announce to the owning
    /// department, resolving it from the report when the event lacks it.
    ReportCreated {
        confirmation: Option<NewNotification>,
        announcement: Announcement,
        department_id: Option<DepartmentId>,
    },
    /// An escalation: resolve the destination department's staff, then
    /// persist and push one notification per member.
    Escalation(ReportEscalationEvent),
}

/// Maps typed upstream events to dispatch plans.
#[derive(Debug, Clone, Default)]
pub struct EventAdapter {
    fallback_recipient: Option<UserId>,
}

impl EventAdapter {
    /// Create an adapter. With `fallback_recipient` unset, events lacking a
    /// recipient are rejected.
    pub fn new(fallback_recipient: Option<UserId>) -> Self {
        Self { fallback_recipient }
    }

    /// Exhaustive mapping of every upstream event kind.
    pub fn adapt(&self, event: &UpstreamEvent) -> Result<DispatchPlan, AdapterError> {
        match event {
            UpstreamEvent::Submission(ev) => self.submission(ev),
            UpstreamEvent::Media(ev) => self.media(ev),
            UpstreamEvent::ReportCreated(ev) => Ok(self.report_created(ev)),
            UpstreamEvent::StatusChange(ev) => self.status_change(ev),
            UpstreamEvent::Assignment(ev) => self.assignment(ev),
            UpstreamEvent::Escalation(ev) => Ok(DispatchPlan::Escalation(ev.clone())),
            UpstreamEvent::Response(ev) => self.response(ev),
        }
    }

    fn recipient(
        &self,
        topic: Topic,
        field: &'static str,
        candidate: Option<UserId>,
    ) -> Result<UserId, AdapterError> {
        if let Some(id) = candidate.filter(|id| id.get() > 0) {
            return Ok(id);
        }
        match self.fallback_recipient {
            Some(fallback) => {
                warn!(
                    topic = %topic,
                    field,
                    fallback_user_id = %fallback,
                    "Recipient missing, applying configured fallback recipient"
                );
                Ok(fallback)
            }
            None => Err(AdapterError::UnresolvedRecipient { topic, field }),
        }
    }

    fn submission(&self, ev: &SubmissionEvent) -> Result<DispatchPlan, AdapterError> {
        let (kind, title, message) = if ev.is_success() {
            let message = if ev.message.is_empty() || ev.message == "stored" {
                "Your report has been submitted successfully.".to_string()
            } else {
                ev.message.clone()
            };
            (NotificationKind::ReportSuccess, "Report Submitted", message)
        } else if ev.is_error() {
            let message = if ev.message.is_empty() {
                "Your report could not be submitted.".to_string()
            } else {
                format!("Your report could not be submitted: {}", ev.message)
            };
            (NotificationKind::ReportError, "Report Submission Failed", message)
        } else {
            return Ok(DispatchPlan::Skip {
                reason: "submission status is not terminal",
            });
        };

        let user_id = self.recipient(Topic::Submission, "user_id", ev.user_id)?;
        Ok(DispatchPlan::Direct(NewNotification::new(
            user_id,
            kind,
            title,
            message,
            ev.report_id,
        )))
    }

    fn media(&self, ev: &MediaProcessingEvent) -> Result<DispatchPlan, AdapterError> {
        let Some(outcome) = ev.outcome() else {
            return Ok(DispatchPlan::Skip {
                reason: "media progress acknowledgement",
            });
        };
        let user_id = self.recipient(Topic::Media, "user_id", ev.user_id)?;
        let draft = match outcome {
            MediaOutcome::Completed => NewNotification::new(
                user_id,
                NotificationKind::MediaCompleted,
                "Media Processed",
                "Your uploaded media is ready.",
                ev.report_id,
            ),
            MediaOutcome::Failed => NewNotification::new(
                user_id,
                NotificationKind::MediaFailed,
                "Media Processing Failed",
                match ev.error_message.as_deref() {
                    Some(reason) if !reason.is_empty() => {
                        format!("Your uploaded media could not be processed: {reason}")
                    }
                    _ => "Your uploaded media could not be processed.".to_string(),
                },
                ev.report_id,
            ),
        };
        Ok(DispatchPlan::Direct(draft))
    }

    fn report_created(&self, ev: &ReportCreatedEvent) -> DispatchPlan {
        let label = report_label(ev.report_id, &ev.title);
        let confirmation = match self.recipient(Topic::ReportCreated, "user_id", ev.user_id) {
            Ok(user_id) => Some(NewNotification::new(
                user_id,
                NotificationKind::ReportCreated,
                "Report Created",
                format!("Your report {label} has been received."),
                Some(ev.report_id),
            )),
            Err(e) => {
                warn!(report_id = %ev.report_id, error = %e, "Skipping reporter confirmation");
                None
            }
        };

        DispatchPlan::ReportCreated {
            confirmation,
            announcement: Announcement {
                report_id: ev.report_id,
                title: "New Report".to_string(),
                message: format!("A new report {label} was filed for your department."),
            },
            department_id: ev.department_id,
        }
    }

    fn status_change(&self, ev: &ReportStatusChangeEvent) -> Result<DispatchPlan, AdapterError> {
        let user_id = self.recipient(Topic::StatusChange, "user_id", ev.user_id)?;
        let label = report_label(ev.report_id, &ev.title);
        Ok(DispatchPlan::Direct(NewNotification::new(
            user_id,
            NotificationKind::StatusUpdate,
            "Report Status Updated",
            format!("Your report {label} {}.", status_phrase(&ev.new_status)),
            Some(ev.report_id),
        )))
    }

    fn assignment(&self, ev: &ReportAssignmentEvent) -> Result<DispatchPlan, AdapterError> {
        let user_id = self.recipient(Topic::Assignment, "assigned_to", ev.assigned_to)?;
        let label = report_label(ev.report_id, &ev.title);
        let message = if ev.severity.is_empty() {
            format!("You have been assigned to report {label}.")
        } else {
            format!(
                "You have been assigned to report {label} (severity: {}).",
                ev.severity
            )
        };
        Ok(DispatchPlan::Direct(NewNotification::new(
            user_id,
            NotificationKind::ReportAssigned,
            "New Report Assigned",
            message,
            Some(ev.report_id),
        )))
    }

    fn response(&self, ev: &ReportResponseEvent) -> Result<DispatchPlan, AdapterError> {
        let user_id = self.recipient(Topic::Response, "reporter_id", ev.reporter_id)?;
        let label = report_label(ev.report_id, &ev.title);
        Ok(DispatchPlan::Direct(NewNotification::new(
            user_id,
            NotificationKind::ReportResponded,
            "New Response on Your Report",
            format!("An official responded to your report {label}."),
            Some(ev.report_id),
        )))
    }
}

/// Expand an escalation into one notification per staff member of the
/// destination department.
pub fn fan_out_escalation(ev: &ReportEscalationEvent, staff: &[StaffRef]) -> Vec<NewNotification> {
    let label = report_label(ev.report_id, &ev.title);
    let message = if ev.reason.is_empty() {
        format!("Report {label} was escalated to your department.")
    } else {
        format!(
            "Report {label} was escalated to your department. Reason: {}",
            ev.reason
        )
    };
    staff
        .iter()
        .map(|member| {
            NewNotification::new(
                member.user_id,
                NotificationKind::ReportEscalated,
                "Report Escalated to Your Department",
                message.clone(),
                Some(ev.report_id),
            )
        })
        .collect()
}

/// Citizen-facing phrase for a report status.
pub fn status_phrase(status: &str) -> String {
    match status {
        "pending" => "is pending review".to_string(),
        "in_progress" => "is now being handled".to_string(),
        "resolved" => "has been resolved".to_string(),
        "rejected" => "has been rejected".to_string(),
        other => format!("changed status to {}", other.replace('_', " ")),
    }
}

fn report_label(report_id: ReportId, title: &str) -> String {
    if title.is_empty() {
        format!("#{report_id}")
    } else {
        format!("\"{title}\"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(topic: Topic, json: &str) -> UpstreamEvent {
        UpstreamEvent::parse(topic, json.as_bytes()).unwrap()
    }

    #[test]
    fn test_status_change_for_report_42() {
        let adapter = EventAdapter::default();
        let ev = parse(
            Topic::StatusChange,
            r#"{"report_id":42,"old_status":"in_progress","new_status":"resolved","user_id":7,"title":"Pothole"}"#,
        );
        let DispatchPlan::Direct(n) = adapter.adapt(&ev).unwrap() else {
            panic!("expected a direct notification");
        };
        assert_eq!(n.user_id, UserId(7));
        assert_eq!(n.kind, NotificationKind::StatusUpdate);
        assert_eq!(n.report_id, Some(ReportId(42)));
        assert_eq!(n.message, "Your report \"Pothole\" has been resolved.");
    }

    #[test]
    fn test_missing_recipient_rejected_without_fallback() {
        let adapter = EventAdapter::default();
        let ev = parse(Topic::Submission, r#"{"request_id":"r1","status":"success"}"#);
        assert!(matches!(
            adapter.adapt(&ev),
            Err(AdapterError::UnresolvedRecipient {
                topic: Topic::Submission,
                field: "user_id"
            })
        ));
    }

    #[test]
    fn test_zero_recipient_treated_as_missing() {
        let adapter = EventAdapter::default();
        let ev = parse(
            Topic::StatusChange,
            r#"{"report_id":1,"new_status":"pending","user_id":0}"#,
        );
        assert!(adapter.adapt(&ev).is_err());
    }

    #[test]
    fn test_fallback_recipient_applied_when_configured() {
        let adapter = EventAdapter::new(Some(UserId(1)));
        let ev = parse(
            Topic::Submission,
            r#"{"RequestID":"r1","Status":"error","Message":"db down"}"#,
        );
        let DispatchPlan::Direct(n) = adapter.adapt(&ev).unwrap() else {
            panic!("expected a direct notification");
        };
        assert_eq!(n.user_id, UserId(1));
        assert_eq!(n.kind, NotificationKind::ReportError);
        assert!(n.message.contains("db down"));
    }

    #[test]
    fn test_media_progress_is_skipped() {
        let adapter = EventAdapter::default();
        let ev = parse(
            Topic::Media,
            r#"{"job_id":1,"status":"processing","original_key":"k","user_id":3}"#,
        );
        assert!(matches!(adapter.adapt(&ev).unwrap(), DispatchPlan::Skip { .. }));
    }

    #[test]
    fn test_assignment_targets_assigned_staff() {
        let adapter = EventAdapter::default();
        let ev = parse(
            Topic::Assignment,
            r#"{"report_id":5,"assigned_to":21,"assigned_by":2,"department_id":100,"severity":"high"}"#,
        );
        let DispatchPlan::Direct(n) = adapter.adapt(&ev).unwrap() else {
            panic!("expected a direct notification");
        };
        assert_eq!(n.user_id, UserId(21));
        assert_eq!(n.kind, NotificationKind::ReportAssigned);
    }

    #[test]
    fn test_report_created_without_reporter_still_announces() {
        let adapter = EventAdapter::default();
        let ev = parse(Topic::ReportCreated, r#"{"report_id":9,"department_id":100}"#);
        let DispatchPlan::ReportCreated {
            confirmation,
            department_id,
            ..
        } = adapter.adapt(&ev).unwrap()
        else {
            panic!("expected a report-created plan");
        };
        assert!(confirmation.is_none());
        assert_eq!(department_id, Some(DepartmentId(100)));
    }

    #[test]
    fn test_escalation_fans_out_one_per_staff() {
        let ev: ReportEscalationEvent = serde_json::from_str(
            r#"{"report_id":42,"from_department_id":1,"to_department_id":100,"reason":"out of scope"}"#,
        )
        .unwrap();
        let staff: Vec<StaffRef> = (11..=13)
            .map(|id| StaffRef {
                user_id: UserId(id),
                name: format!("staff-{id}"),
            })
            .collect();

        let drafts = fan_out_escalation(&ev, &staff);
        assert_eq!(drafts.len(), 3);
        assert!(drafts.iter().all(|d| d.kind == NotificationKind::ReportEscalated));
        assert_eq!(
            drafts.iter().map(|d| d.user_id).collect::<Vec<_>>(),
            vec![UserId(11), UserId(12), UserId(13)]
        );
        assert!(fan_out_escalation(&ev, &[]).is_empty());
    }

    #[test]
    fn test_status_phrases() {
        assert_eq!(status_phrase("in_progress"), "is now being handled");
        assert_eq!(status_phrase("on_hold"), "changed status to on hold");
    }
}

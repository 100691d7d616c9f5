//! Dispatch router: carries out adapter plans against the store and the
//! subscriber registry.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use civicpulse_core::types::id::{DepartmentId, UserId};
use civicpulse_database::{NotificationStore, StaffDirectory};
use civicpulse_entity::event::ReportEscalationEvent;
use civicpulse_entity::notification::{NewNotification, NotificationKind};

use crate::bridge::{
    AdapterError, Announcement, DispatchPlan, EventAdapter, UpstreamEvent, fan_out_escalation,
};
use crate::connection::{DeliveryReport, SubscriberRegistry};
use crate::message::types::OutboundMessage;
use crate::metrics::RealtimeMetrics;

use super::waiter::SubmissionWaiters;

/// What one dispatched event produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Notifications built for individual recipients.
    pub notifications: usize,
    /// Of those, how many were stored.
    pub persisted: usize,
    /// Connections that received a notification frame.
    pub delivered: usize,
    /// Connections that received a department announcement.
    pub announced: usize,
}

/// Result of routing one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Notifications were produced and pushed.
    Dispatched(DispatchSummary),
    /// The event needed no notification.
    Skipped(&'static str),
}

/// Persists notifications, then pushes them to live subscribers.
///
/// Storage is written before any push. When storage fails the notification
/// is still pushed, without an id, so online users are not penalised for a
/// database outage.
#[derive(Debug)]
pub struct DispatchRouter {
    adapter: EventAdapter,
    registry: Arc<SubscriberRegistry>,
    store: Arc<dyn NotificationStore>,
    directory: Arc<dyn StaffDirectory>,
    metrics: Arc<RealtimeMetrics>,
    waiters: Option<Arc<SubmissionWaiters>>,
    push_unread_count: bool,
}

impl DispatchRouter {
    /// Create a router.
    pub fn new(
        adapter: EventAdapter,
        registry: Arc<SubscriberRegistry>,
        store: Arc<dyn NotificationStore>,
        directory: Arc<dyn StaffDirectory>,
        metrics: Arc<RealtimeMetrics>,
        push_unread_count: bool,
    ) -> Self {
        Self {
            adapter,
            registry,
            store,
            directory,
            metrics,
            waiters: None,
            push_unread_count,
        }
    }

    /// Hand submission outcomes to callers waiting on their request id.
    pub fn with_waiters(mut self, waiters: Arc<SubmissionWaiters>) -> Self {
        self.waiters = Some(waiters);
        self
    }

    /// Route one parsed event. Only adapter rejections are returned as
    /// errors; storage and directory failures are logged and absorbed.
    ///
    /// A submission outcome completes any wait on its request id first. One
    /// that reached a waiter but names no recipient is skipped, not rejected.
    pub async fn dispatch(&self, event: &UpstreamEvent) -> Result<DispatchOutcome, AdapterError> {
        let awaited = match (event, &self.waiters) {
            (UpstreamEvent::Submission(ev), Some(waiters)) => waiters.deliver(ev),
            _ => false,
        };
        let plan = match self.adapter.adapt(event) {
            Ok(plan) => plan,
            Err(AdapterError::UnresolvedRecipient { .. }) if awaited => {
                return Ok(DispatchOutcome::Skipped("submission outcome delivered to waiter only"));
            }
            Err(e) => return Err(e),
        };
        let summary = match plan {
            DispatchPlan::Skip { reason } => return Ok(DispatchOutcome::Skipped(reason)),
            DispatchPlan::Direct(draft) => {
                let mut summary = DispatchSummary::default();
                self.deliver(draft, &mut summary).await;
                summary
            }
            DispatchPlan::ReportCreated {
                confirmation,
                announcement,
                department_id,
            } => {
                let mut summary = DispatchSummary::default();
                if let Some(draft) = confirmation {
                    self.deliver(draft, &mut summary).await;
                }
                summary.announced = self.announce(department_id, announcement).await;
                summary
            }
            DispatchPlan::Escalation(ev) => self.escalate(&ev).await,
        };
        Ok(DispatchOutcome::Dispatched(summary))
    }

    /// Push the user's current unread count to their live connections.
    pub async fn refresh_unread_count(&self, user_id: UserId) -> DeliveryReport {
        match self.store.count_unread(user_id).await {
            Ok(count) => self
                .registry
                .send_to_user(user_id, &OutboundMessage::UnreadCount { count }),
            Err(e) => {
                debug!(user_id = %user_id, error = %e, "Unread count unavailable");
                DeliveryReport::default()
            }
        }
    }

    async fn deliver(&self, draft: NewNotification, summary: &mut DispatchSummary) {
        summary.notifications += 1;
        let (message, persisted) = match self.store.save(&draft).await {
            Ok(stored) => {
                self.metrics.notification_persisted();
                summary.persisted += 1;
                (OutboundMessage::notification(&stored), true)
            }
            Err(e) => {
                self.metrics.persistence_failed();
                error!(
                    user_id = %draft.user_id,
                    kind = %draft.kind,
                    error = %e,
                    "Notification persistence failed, delivering without id"
                );
                (OutboundMessage::unsaved(&draft), false)
            }
        };

        let report = self.registry.send_to_user(draft.user_id, &message);
        summary.delivered += report.delivered;
        debug!(
            user_id = %draft.user_id,
            kind = %draft.kind,
            delivered = report.delivered,
            dropped = report.dropped,
            "Notification routed"
        );

        if persisted && self.push_unread_count && report.delivered > 0 {
            self.refresh_unread_count(draft.user_id).await;
        }
    }

    async fn announce(&self, department_id: Option<DepartmentId>, announcement: Announcement) -> usize {
        let department_id = match department_id {
            Some(id) => id,
            None => match self.directory.department_for_report(announcement.report_id).await {
                Ok(Some(id)) => id,
                Ok(None) => {
                    debug!(report_id = %announcement.report_id, "Report has no department, announcement skipped");
                    return 0;
                }
                Err(e) => {
                    warn!(
                        report_id = %announcement.report_id,
                        error = %e,
                        "Department lookup failed, announcement skipped"
                    );
                    return 0;
                }
            },
        };

        let message = OutboundMessage::Announcement {
            kind: NotificationKind::ReportCreated,
            department_id,
            title: announcement.title,
            message: announcement.message,
            report_id: Some(announcement.report_id),
            timestamp: Utc::now(),
        };
        self.registry.send_to_department(department_id, &message).delivered
    }

    async fn escalate(&self, ev: &ReportEscalationEvent) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        let staff = match self.directory.find_staff_in_department(ev.to_department_id).await {
            Ok(staff) => staff,
            Err(e) => {
                warn!(
                    report_id = %ev.report_id,
                    department_id = %ev.to_department_id,
                    error = %e,
                    "Staff lookup failed, escalation not fanned out"
                );
                return summary;
            }
        };
        if staff.is_empty() {
            info!(
                report_id = %ev.report_id,
                department_id = %ev.to_department_id,
                "Escalation target department has no active staff"
            );
        }

        for draft in fan_out_escalation(ev, &staff) {
            self.deliver(draft, &mut summary).await;
        }
        summary
    }
}

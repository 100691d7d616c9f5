//! Top-level real-time engine that ties together all subsystems.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, Stream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use civicpulse_core::config::{NotificationsConfig, RealtimeConfig};
use civicpulse_core::error::AppError;
use civicpulse_core::result::AppResult;
use civicpulse_core::types::id::{DepartmentId, UserId};
use civicpulse_database::{NotificationStore, StaffDirectory};
use civicpulse_entity::user::UserRole;

use crate::bridge::{AdapterError, EventAdapter, Topic, UpstreamEvent};
use crate::connection::pump::{self, InboundFrame, PumpConfig};
use crate::connection::{Frame, Subscriber, SubscriberRegistry};
use crate::metrics::RealtimeMetrics;
use crate::notification::{
    DispatchOutcome, DispatchRouter, DispatchSummary, EventDeduplicator, SubmissionWaiters,
};

/// Longest payload prefix quoted in rejection logs.
const PAYLOAD_EXCERPT_BYTES: usize = 256;

/// Result of processing one upstream message.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Notifications were produced.
    Dispatched(DispatchSummary),
    /// The event needed no notification.
    Skipped(&'static str),
    /// The message was already processed recently.
    Duplicate,
    /// The payload was malformed or had no resolvable recipient.
    Rejected(AdapterError),
}

/// Central real-time engine shared by the push endpoint and the consumers.
#[derive(Clone)]
pub struct RealtimeEngine {
    /// Live subscribers.
    pub registry: Arc<SubscriberRegistry>,
    /// Event routing.
    pub router: Arc<DispatchRouter>,
    /// Redelivery suppression.
    pub dedup: Arc<EventDeduplicator>,
    /// Metrics collector.
    pub metrics: Arc<RealtimeMetrics>,
    /// Callers waiting on a submission outcome.
    pub waiters: Arc<SubmissionWaiters>,
    store: Arc<dyn NotificationStore>,
    directory: Arc<dyn StaffDirectory>,
    pump: PumpConfig,
    push_unread_count: bool,
}

impl std::fmt::Debug for RealtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEngine")
            .field("connections", &self.registry.connection_count())
            .finish()
    }
}

impl RealtimeEngine {
    /// Creates a new real-time engine over the given gateways.
    pub fn new(
        realtime: &RealtimeConfig,
        notifications: &NotificationsConfig,
        store: Arc<dyn NotificationStore>,
        directory: Arc<dyn StaffDirectory>,
    ) -> Self {
        let metrics = Arc::new(RealtimeMetrics::new());
        let registry = Arc::new(SubscriberRegistry::new(realtime.clone(), metrics.clone()));
        let waiters = Arc::new(SubmissionWaiters::new());
        let router = Arc::new(
            DispatchRouter::new(
                EventAdapter::new(notifications.fallback_recipient),
                registry.clone(),
                store.clone(),
                directory.clone(),
                metrics.clone(),
                realtime.push_unread_count,
            )
            .with_waiters(waiters.clone()),
        );
        let dedup = Arc::new(EventDeduplicator::new(notifications.dedup_window_ms));

        info!(
            queue_capacity = realtime.queue_capacity,
            backpressure = ?realtime.backpressure,
            "Real-time engine initialized"
        );

        Self {
            registry,
            router,
            dedup,
            metrics,
            waiters,
            store,
            directory,
            pump: PumpConfig {
                ping_interval: Duration::from_secs(realtime.ping_interval_seconds),
            },
            push_unread_count: realtime.push_unread_count,
        }
    }

    /// Notification store backing this engine.
    pub fn store(&self) -> &Arc<dyn NotificationStore> {
        &self.store
    }

    /// Parse, deduplicate, and route one upstream message.
    ///
    /// Never fails: every outcome is logged and counted, and the caller may
    /// acknowledge the message whatever is returned.
    pub async fn process(
        &self,
        topic: Topic,
        message_id: Option<&str>,
        payload: &[u8],
    ) -> ProcessOutcome {
        if let Some(id) = message_id {
            if !self.dedup.should_dispatch(topic, id) {
                self.metrics.event_deduplicated();
                debug!(topic = %topic, message_id = id, "Redelivered event suppressed");
                return ProcessOutcome::Duplicate;
            }
        }

        let result = match UpstreamEvent::parse(topic, payload) {
            Ok(event) => self.router.dispatch(&event).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(DispatchOutcome::Dispatched(summary)) => {
                self.metrics.event_processed();
                debug!(
                    topic = %topic,
                    notifications = summary.notifications,
                    delivered = summary.delivered,
                    announced = summary.announced,
                    "Event dispatched"
                );
                ProcessOutcome::Dispatched(summary)
            }
            Ok(DispatchOutcome::Skipped(reason)) => {
                self.metrics.event_skipped();
                debug!(topic = %topic, reason, "Event skipped");
                ProcessOutcome::Skipped(reason)
            }
            Err(e) => {
                self.metrics.event_malformed();
                warn!(
                    topic = %topic,
                    message_id,
                    error = %e,
                    payload = %payload_excerpt(payload),
                    "Event rejected"
                );
                ProcessOutcome::Rejected(e)
            }
        }
    }

    /// Open and register a subscriber for an authenticated user.
    ///
    /// Staff connections capture their department once, here. A failed
    /// directory lookup registers the connection without one. Fails once
    /// shutdown has started.
    pub async fn connect(
        &self,
        user_id: UserId,
        role: UserRole,
    ) -> AppResult<(Arc<Subscriber>, mpsc::Receiver<Frame>)> {
        if self.is_shutting_down() {
            return Err(AppError::service_unavailable("Server is shutting down"));
        }
        let department_id = if role.is_staff() {
            self.lookup_department(user_id).await
        } else {
            None
        };

        let (subscriber, queue) = self.registry.open(user_id, role, department_id);
        if !self.registry.register(subscriber.clone()) {
            return Err(AppError::service_unavailable("Server is shutting down"));
        }

        if self.push_unread_count {
            self.router.refresh_unread_count(user_id).await;
        }
        Ok((subscriber, queue))
    }

    /// Pump a registered subscriber over a transport until it closes.
    pub async fn serve<W, R, E>(
        &self,
        subscriber: Arc<Subscriber>,
        queue: mpsc::Receiver<Frame>,
        sink: W,
        stream: R,
    ) where
        W: Sink<String> + Unpin + Send + 'static,
        W::Error: Display + Send,
        R: Stream<Item = Result<InboundFrame, E>> + Unpin,
        E: Display,
    {
        pump::drive(
            subscriber,
            self.registry.clone(),
            queue,
            sink,
            stream,
            self.pump,
        )
        .await;
    }

    /// Whether `shutdown` has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.registry.is_closing()
    }

    /// Close every live connection and refuse new ones. Consumers must be
    /// stopped first so no new deliveries race the close.
    pub fn shutdown(&self) {
        info!("Shutting down real-time engine");
        self.registry.close_all();
        info!("Real-time engine shut down");
    }

    async fn lookup_department(&self, user_id: UserId) -> Option<DepartmentId> {
        match self.directory.department_of_user(user_id).await {
            Ok(department_id) => department_id,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Department lookup failed, connecting without one");
                None
            }
        }
    }
}

/// Lossy UTF-8 prefix of a payload, for logs.
fn payload_excerpt(payload: &[u8]) -> String {
    let end = payload.len().min(PAYLOAD_EXCERPT_BYTES);
    let mut excerpt = String::from_utf8_lossy(&payload[..end]).into_owned();
    if payload.len() > end {
        excerpt.push_str("...");
    }
    excerpt
}

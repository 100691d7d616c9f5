//! Realtime engine metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Engine-level counters, shared by the registry, router, and consumers.
#[derive(Debug, Default)]
pub struct RealtimeMetrics {
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
    connections_evicted: AtomicU64,
    pushes_sent: AtomicU64,
    pushes_dropped: AtomicU64,
    notifications_persisted: AtomicU64,
    persistence_failures: AtomicU64,
    events_processed: AtomicU64,
    events_malformed: AtomicU64,
    events_skipped: AtomicU64,
    events_deduplicated: AtomicU64,
}

macro_rules! counter {
    ($($(#[$meta:meta])* $name:ident => $field:ident;)*) => {
        $(
            $(#[$meta])*
            pub fn $name(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl RealtimeMetrics {
    /// Create new zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    counter! {
        /// A subscriber was registered.
        connection_opened => connections_opened;
        /// A subscriber was unregistered.
        connection_closed => connections_closed;
        /// A subscriber was forcibly removed.
        connection_evicted => connections_evicted;
        /// A frame was queued for a subscriber.
        push_sent => pushes_sent;
        /// A frame was dropped on a full queue.
        push_dropped => pushes_dropped;
        /// A notification was stored.
        notification_persisted => notifications_persisted;
        /// Storing a notification failed.
        persistence_failed => persistence_failures;
        /// An upstream event was handled.
        event_processed => events_processed;
        /// An upstream event could not be parsed or resolved.
        event_malformed => events_malformed;
        /// An upstream event needed no notification.
        event_skipped => events_skipped;
        /// A redelivered upstream event was suppressed.
        event_deduplicated => events_deduplicated;
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let opened = self.connections_opened.load(Ordering::Relaxed);
        let closed = self.connections_closed.load(Ordering::Relaxed);
        MetricsSnapshot {
            connections_opened: opened,
            connections_closed: closed,
            connections_active: opened.saturating_sub(closed),
            connections_evicted: self.connections_evicted.load(Ordering::Relaxed),
            pushes_sent: self.pushes_sent.load(Ordering::Relaxed),
            pushes_dropped: self.pushes_dropped.load(Ordering::Relaxed),
            notifications_persisted: self.notifications_persisted.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
            events_processed: self.events_processed.load(Ordering::Relaxed),
            events_malformed: self.events_malformed.load(Ordering::Relaxed),
            events_skipped: self.events_skipped.load(Ordering::Relaxed),
            events_deduplicated: self.events_deduplicated.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub connections_active: u64,
    pub connections_evicted: u64,
    pub pushes_sent: u64,
    pub pushes_dropped: u64,
    pub notifications_persisted: u64,
    pub persistence_failures: u64,
    pub events_processed: u64,
    pub events_malformed: u64,
    pub events_skipped: u64,
    pub events_deduplicated: u64,
}

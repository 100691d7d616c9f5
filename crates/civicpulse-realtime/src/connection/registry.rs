//! Subscriber registry: the set of live push connections.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use civicpulse_core::config::{BackpressurePolicy, RealtimeConfig};
use civicpulse_core::types::id::{DepartmentId, UserId};
use civicpulse_entity::user::UserRole;

use crate::message::serializer;
use crate::message::types::OutboundMessage;
use crate::metrics::RealtimeMetrics;

use super::handle::{ConnectionState, Frame, SendOutcome, Subscriber, SubscriberId};

/// Per-call delivery tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Connections the frame was queued on.
    pub delivered: usize,
    /// Connections whose full queue dropped the frame.
    pub dropped: usize,
    /// Connections evicted during this call.
    pub evicted: usize,
}

/// Thread-safe registry of live subscribers.
///
/// Broadcasts snapshot their targets before sending, so no map guard is held
/// while frames are queued, and any evictions they trigger run only after
/// the snapshot has been fully walked.
#[derive(Debug)]
pub struct SubscriberRegistry {
    by_id: DashMap<SubscriberId, Arc<Subscriber>>,
    by_user: DashMap<UserId, Vec<SubscriberId>>,
    closing: AtomicBool,
    config: RealtimeConfig,
    metrics: Arc<RealtimeMetrics>,
}

impl SubscriberRegistry {
    /// Creates an empty registry.
    pub fn new(config: RealtimeConfig, metrics: Arc<RealtimeMetrics>) -> Self {
        Self {
            by_id: DashMap::new(),
            by_user: DashMap::new(),
            closing: AtomicBool::new(false),
            config,
            metrics,
        }
    }

    /// Create a subscriber sized by the configured queue capacity.
    pub fn open(
        &self,
        user_id: UserId,
        role: UserRole,
        department_id: Option<DepartmentId>,
    ) -> (Arc<Subscriber>, mpsc::Receiver<Frame>) {
        Subscriber::new(user_id, role, department_id, self.config.queue_capacity)
    }

    /// Add a `Connecting` subscriber to the live set.
    ///
    /// A user may hold any number of connections; all of them receive that
    /// user's deliveries. Returns `false` if the subscriber was not in the
    /// `Connecting` state, or if the registry is closing, in which case the
    /// subscriber ends up closed.
    pub fn register(&self, subscriber: Arc<Subscriber>) -> bool {
        if !subscriber.transition(ConnectionState::Connecting, ConnectionState::Registered) {
            warn!(conn_id = %subscriber.id, "Register called on a non-connecting subscriber");
            return false;
        }

        self.by_id.insert(subscriber.id, subscriber.clone());
        self.by_user
            .entry(subscriber.user_id)
            .or_default()
            .push(subscriber.id);

        self.metrics.connection_opened();

        // Checked after the insert so a concurrent close_all either sees this
        // subscriber or is seen here.
        if self.closing.load(Ordering::SeqCst) {
            self.unregister(&subscriber.id);
            info!(conn_id = %subscriber.id, "Registry closing, subscriber refused");
            return false;
        }

        info!(
            conn_id = %subscriber.id,
            user_id = %subscriber.user_id,
            role = %subscriber.role,
            department_id = ?subscriber.department_id.map(|d| d.get()),
            "Subscriber registered"
        );
        true
    }

    /// Remove a subscriber and stop its pump. Idempotent: only the first
    /// call for a given id has any effect.
    pub fn unregister(&self, id: &SubscriberId) -> bool {
        let Some((_, subscriber)) = self.by_id.remove(id) else {
            return false;
        };

        subscriber.transition(ConnectionState::Registered, ConnectionState::Unregistering);

        if let Some(mut ids) = self.by_user.get_mut(&subscriber.user_id) {
            ids.retain(|c| c != id);
        }
        self.by_user
            .remove_if(&subscriber.user_id, |_, ids| ids.is_empty());

        subscriber.close();
        self.metrics.connection_closed();

        info!(
            conn_id = %id,
            user_id = %subscriber.user_id,
            "Subscriber unregistered"
        );
        true
    }

    /// Unregister a subscriber that can no longer keep up.
    pub fn evict(&self, id: &SubscriberId, reason: &'static str) -> bool {
        let removed = self.unregister(id);
        if removed {
            self.metrics.connection_evicted();
            info!(conn_id = %id, reason, "Connection evicted");
        }
        removed
    }

    /// Deliver to every connection of one user.
    pub fn send_to_user(&self, user_id: UserId, msg: &OutboundMessage) -> DeliveryReport {
        match serializer::encode(msg) {
            Ok(frame) => self.send_frame_to_user(user_id, frame),
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Failed to serialize outbound message");
                DeliveryReport::default()
            }
        }
    }

    /// Deliver a pre-serialized frame to every connection of one user.
    pub fn send_frame_to_user(&self, user_id: UserId, frame: Frame) -> DeliveryReport {
        let targets = self.user_connections(user_id);
        self.deliver(targets, frame)
    }

    /// Deliver to every connection whose captured role matches.
    pub fn send_to_role(&self, role: UserRole, msg: &OutboundMessage) -> DeliveryReport {
        let targets = self.snapshot(|s| s.role == role);
        self.encode_and_deliver(targets, msg)
    }

    /// Deliver to staff connections of one department. Citizens are never
    /// matched, whatever department they carry.
    pub fn send_to_department(
        &self,
        department_id: DepartmentId,
        msg: &OutboundMessage,
    ) -> DeliveryReport {
        let targets = self.snapshot(|s| s.is_staff_of(department_id));
        self.encode_and_deliver(targets, msg)
    }

    /// Unregister every live connection and refuse later registrations.
    pub fn close_all(&self) {
        self.closing.store(true, Ordering::SeqCst);
        let ids: Vec<SubscriberId> = self.by_id.iter().map(|e| *e.key()).collect();
        let count = ids.len();
        for id in ids {
            self.unregister(&id);
        }
        info!(count, "All subscribers closed");
    }

    /// Whether `close_all` has been called.
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.by_id.len()
    }

    /// Number of users with at least one live connection.
    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }

    /// Whether the user has any live connection.
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.by_user
            .get(&user_id)
            .is_some_and(|ids| !ids.is_empty())
    }

    /// Live connections of one user.
    pub fn user_connections(&self, user_id: UserId) -> Vec<Arc<Subscriber>> {
        let ids = self
            .by_user
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        ids.iter()
            .filter_map(|id| self.by_id.get(id).map(|e| e.value().clone()))
            .collect()
    }

    fn snapshot(&self, filter: impl Fn(&Subscriber) -> bool) -> Vec<Arc<Subscriber>> {
        self.by_id
            .iter()
            .filter(|e| filter(e.value()))
            .map(|e| e.value().clone())
            .collect()
    }

    fn encode_and_deliver(&self, targets: Vec<Arc<Subscriber>>, msg: &OutboundMessage) -> DeliveryReport {
        if targets.is_empty() {
            return DeliveryReport::default();
        }
        match serializer::encode(msg) {
            Ok(frame) => self.deliver(targets, frame),
            Err(e) => {
                error!(error = %e, "Failed to serialize outbound message");
                DeliveryReport::default()
            }
        }
    }

    fn deliver(&self, targets: Vec<Arc<Subscriber>>, frame: Frame) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut doomed: Vec<SubscriberId> = Vec::new();

        for subscriber in &targets {
            match subscriber.try_send(frame.clone()) {
                SendOutcome::Queued => {
                    report.delivered += 1;
                    self.metrics.push_sent();
                }
                SendOutcome::Full => match self.config.backpressure {
                    BackpressurePolicy::DropNewest => {
                        report.dropped += 1;
                        self.metrics.push_dropped();
                        warn!(
                            conn_id = %subscriber.id,
                            user_id = %subscriber.user_id,
                            "Delivery dropped, outbound queue full"
                        );
                    }
                    BackpressurePolicy::Disconnect => {
                        self.metrics.push_dropped();
                        doomed.push(subscriber.id);
                    }
                },
                SendOutcome::Closed => {
                    debug!(conn_id = %subscriber.id, "Outbound queue closed");
                    doomed.push(subscriber.id);
                }
            }
        }

        for id in doomed {
            if self.evict(&id, "outbound queue unavailable") {
                report.evicted += 1;
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(capacity: usize, policy: BackpressurePolicy) -> SubscriberRegistry {
        let config = RealtimeConfig {
            queue_capacity: capacity,
            backpressure: policy,
            ..RealtimeConfig::default()
        };
        SubscriberRegistry::new(config, Arc::new(RealtimeMetrics::new()))
    }

    fn connect(
        registry: &SubscriberRegistry,
        user: i64,
        role: UserRole,
        dept: Option<i64>,
    ) -> (Arc<Subscriber>, mpsc::Receiver<Frame>) {
        let (sub, rx) = registry.open(UserId(user), role, dept.map(DepartmentId));
        assert!(registry.register(sub.clone()));
        (sub, rx)
    }

    fn ping() -> OutboundMessage {
        OutboundMessage::Ping { timestamp: 1 }
    }

    #[test]
    fn test_count_tracks_register_and_unregister() {
        let registry = registry_with(8, BackpressurePolicy::DropNewest);
        let (a, _ra) = connect(&registry, 1, UserRole::Citizen, None);
        let (b, _rb) = connect(&registry, 1, UserRole::Citizen, None);
        assert_eq!(registry.connection_count(), 2);
        assert_eq!(registry.user_count(), 1);

        assert!(registry.unregister(&a.id));
        assert!(!registry.unregister(&a.id));
        assert_eq!(registry.connection_count(), 1);

        assert!(registry.unregister(&b.id));
        assert_eq!(registry.connection_count(), 0);
        assert!(!registry.is_online(UserId(1)));
        assert_eq!(b.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_double_register_rejected() {
        let registry = registry_with(8, BackpressurePolicy::DropNewest);
        let (a, _ra) = connect(&registry, 1, UserRole::Citizen, None);
        assert!(!registry.register(a));
        assert_eq!(registry.connection_count(), 1);
    }

    #[test]
    fn test_send_to_user_reaches_only_that_user() {
        let registry = registry_with(8, BackpressurePolicy::DropNewest);
        let (_a, mut ra) = connect(&registry, 7, UserRole::Citizen, None);
        let (_b, mut rb) = connect(&registry, 7, UserRole::Citizen, None);
        let (_c, mut rc) = connect(&registry, 8, UserRole::Citizen, None);

        let report = registry.send_to_user(UserId(7), &ping());
        assert_eq!(report.delivered, 2);
        assert!(ra.try_recv().is_ok());
        assert!(rb.try_recv().is_ok());
        assert!(rc.try_recv().is_err());
    }

    #[test]
    fn test_send_to_department_skips_citizens() {
        let registry = registry_with(8, BackpressurePolicy::DropNewest);
        let (_staff, mut rs) = connect(&registry, 1, UserRole::Government, Some(100));
        let (_citizen, mut rc) = connect(&registry, 2, UserRole::Citizen, Some(100));
        let (_other, mut ro) = connect(&registry, 3, UserRole::Government, Some(200));
        let (_admin, mut rad) = connect(&registry, 4, UserRole::Admin, Some(100));

        let report = registry.send_to_department(DepartmentId(100), &ping());
        assert_eq!(report.delivered, 1);
        assert!(rs.try_recv().is_ok());
        assert!(rc.try_recv().is_err());
        assert!(ro.try_recv().is_err());
        assert!(rad.try_recv().is_err());
    }

    #[test]
    fn test_send_to_role() {
        let registry = registry_with(8, BackpressurePolicy::DropNewest);
        let (_a, mut ra) = connect(&registry, 1, UserRole::Admin, None);
        let (_b, mut rb) = connect(&registry, 2, UserRole::Citizen, None);

        assert_eq!(registry.send_to_role(UserRole::Admin, &ping()).delivered, 1);
        assert!(ra.try_recv().is_ok());
        assert!(rb.try_recv().is_err());
    }

    #[test]
    fn test_saturated_queue_does_not_block_others() {
        let registry = registry_with(1, BackpressurePolicy::DropNewest);
        let (slow, _rs) = connect(&registry, 1, UserRole::Government, Some(100));
        let (_fast, mut rf) = connect(&registry, 2, UserRole::Government, Some(100));

        registry.send_to_department(DepartmentId(100), &ping());
        rf.try_recv().unwrap();

        let report = registry.send_to_department(DepartmentId(100), &ping());
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 1);
        assert!(rf.try_recv().is_ok());
        assert_eq!(slow.state(), ConnectionState::Registered);
    }

    #[test]
    fn test_disconnect_policy_evicts_slow_connection() {
        let registry = registry_with(1, BackpressurePolicy::Disconnect);
        let (slow, _rs) = connect(&registry, 1, UserRole::Citizen, None);

        registry.send_to_user(UserId(1), &ping());
        let report = registry.send_to_user(UserId(1), &ping());
        assert_eq!(report.evicted, 1);
        assert_eq!(registry.connection_count(), 0);
        assert!(slow.is_closed());
    }

    #[test]
    fn test_closed_queue_is_evicted() {
        let registry = registry_with(4, BackpressurePolicy::DropNewest);
        let (_gone, rx) = connect(&registry, 1, UserRole::Citizen, None);
        drop(rx);
        let report = registry.send_to_user(UserId(1), &ping());
        assert_eq!(report.evicted, 1);
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn test_register_after_close_all_is_refused() {
        let registry = registry_with(8, BackpressurePolicy::DropNewest);
        let (early, _re) = connect(&registry, 1, UserRole::Citizen, None);
        registry.close_all();
        assert!(early.is_closed());
        assert!(registry.is_closing());

        let (late, _rl) = registry.open(UserId(2), UserRole::Citizen, None);
        assert!(!registry.register(late.clone()));
        assert!(late.is_closed());
        assert_eq!(registry.connection_count(), 0);
        assert!(!registry.is_online(UserId(2)));
    }

    #[test]
    fn test_many_connections_per_user_all_stay_live() {
        let registry = SubscriberRegistry::new(RealtimeConfig::default(), Arc::new(RealtimeMetrics::new()));
        let mut subs = Vec::new();
        for _ in 0..12 {
            subs.push(connect(&registry, 7, UserRole::Citizen, None));
        }
        assert_eq!(registry.connection_count(), 12);

        let report = registry.send_to_user(UserId(7), &ping());
        assert_eq!(report.delivered, 12);
        assert_eq!(report.evicted, 0);
        for (sub, rx) in &mut subs {
            assert!(!sub.is_closed());
            assert!(rx.try_recv().is_ok());
        }

        for (sub, _) in subs.iter().take(5) {
            assert!(registry.unregister(&sub.id));
        }
        assert_eq!(registry.connection_count(), 12 - 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_unregister() {
        let config = RealtimeConfig {
            queue_capacity: 4,
            ..RealtimeConfig::default()
        };
        let registry = Arc::new(SubscriberRegistry::new(config, Arc::new(RealtimeMetrics::new())));

        let mut joins = Vec::new();
        for i in 0..500 {
            let registry = registry.clone();
            joins.push(tokio::spawn(async move {
                let role = if i % 2 == 0 { UserRole::Citizen } else { UserRole::Government };
                let (sub, rx) = registry.open(UserId(i % 50), role, Some(DepartmentId(i % 3)));
                registry.register(sub.clone());
                (sub, rx)
            }));
        }
        let mut subs = Vec::new();
        for j in joins {
            subs.push(j.await.unwrap());
        }
        assert_eq!(registry.connection_count(), 500);

        let broadcaster = {
            let registry = registry.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    registry.send_to_department(DepartmentId(1), &ping());
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut joins = Vec::new();
        for (sub, _rx) in &subs {
            let registry = registry.clone();
            let id = sub.id;
            joins.push(tokio::spawn(async move { registry.unregister(&id) }));
        }
        for j in joins {
            assert!(j.await.unwrap());
        }
        broadcaster.await.unwrap();

        assert_eq!(registry.connection_count(), 0);
        assert_eq!(registry.user_count(), 0);
        assert!(subs.iter().all(|(s, _)| s.is_closed()));
    }
}

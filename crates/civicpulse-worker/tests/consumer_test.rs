//! Consumer fleet behavior against the in-memory source.

use std::sync::Arc;
use std::time::Duration;

use civicpulse_core::config::{NotificationsConfig, RealtimeConfig, StreamsConfig};
use civicpulse_core::types::id::UserId;
use civicpulse_database::{MemoryNotificationStore, MemoryStaffDirectory, NotificationStore};
use civicpulse_realtime::{RealtimeEngine, Topic};
use civicpulse_worker::{ConsumerFleet, MemoryEventSource};

const STATUS_RESOLVED: &[u8] = br#"{"report_id":42,"new_status":"resolved","user_id":7}"#;

struct Harness {
    fleet: ConsumerFleet,
    store: Arc<MemoryNotificationStore>,
    engine: RealtimeEngine,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryNotificationStore::new());
    let engine = RealtimeEngine::new(
        &RealtimeConfig::default(),
        &NotificationsConfig::default(),
        store.clone(),
        Arc::new(MemoryStaffDirectory::new()),
    );
    let streams = StreamsConfig {
        backoff_base_ms: 10,
        backoff_max_ms: 40,
        ..StreamsConfig::default()
    };
    Harness {
        fleet: ConsumerFleet::new(engine.clone(), streams),
        store,
        engine,
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_malformed_payload_is_acked_and_dropped() {
    let h = harness();
    let source = Arc::new(MemoryEventSource::new("report.status_change"));
    source.push("1-0", b"{not json".to_vec());
    source.push("2-0", STATUS_RESOLVED.to_vec());
    h.fleet.spawn(Topic::StatusChange, source.clone());

    wait_until(|| source.acked().len() == 2).await;

    assert_eq!(source.acked(), vec!["1-0".to_string(), "2-0".to_string()]);
    assert_eq!(source.pending_count(), 0);
    assert_eq!(h.store.count_total(UserId(7)).await.unwrap(), 1);
    let metrics = h.engine.metrics.snapshot();
    assert_eq!(metrics.events_malformed, 1);
    assert_eq!(metrics.events_processed, 1);

    h.fleet.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_redelivered_message_dispatched_once() {
    let h = harness();
    let source = Arc::new(MemoryEventSource::new("report.status_change"));
    source.push("5-0", STATUS_RESOLVED.to_vec());
    h.fleet.spawn(Topic::StatusChange, source.clone());
    wait_until(|| source.acked().len() == 1).await;

    // The broker hands the same entry back, as after a lost acknowledgement.
    source.push("5-0", STATUS_RESOLVED.to_vec());
    wait_until(|| source.acked().len() == 2).await;

    assert_eq!(h.store.count_total(UserId(7)).await.unwrap(), 1);
    assert_eq!(h.engine.metrics.snapshot().events_deduplicated, 1);

    h.fleet.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_consumer_recovers_after_read_failures() {
    let h = harness();
    let source = Arc::new(MemoryEventSource::new("media.events"));
    source.fail_next(3);
    h.fleet.spawn(Topic::Media, source.clone());

    wait_until(|| h.fleet.statuses()[0].consecutive_failures > 0).await;
    assert!(!h.fleet.is_ready());

    wait_until(|| h.fleet.is_ready()).await;
    let status = &h.fleet.statuses()[0];
    assert!(status.attached);
    assert!(status.last_error.is_some());

    h.fleet.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_fleet_not_ready_until_consumers_attach() {
    let h = harness();
    assert!(!h.fleet.is_ready());

    for topic in Topic::ALL {
        h.fleet
            .spawn(topic, Arc::new(MemoryEventSource::new(topic.as_str())));
    }
    wait_until(|| h.fleet.is_ready()).await;
    assert_eq!(h.fleet.statuses().len(), Topic::ALL.len());

    h.fleet.shutdown(Duration::from_secs(1)).await;
    assert!(h.fleet.statuses().iter().all(|s| !s.attached));
}

//! End-to-end event processing: raw payload in, stored records and queued
//! frames out.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use civicpulse_core::config::{NotificationsConfig, RealtimeConfig};
use civicpulse_core::types::id::{DepartmentId, ReportId, UserId};
use civicpulse_database::{MemoryNotificationStore, MemoryStaffDirectory, NotificationStore};
use civicpulse_entity::notification::NotificationKind;
use civicpulse_entity::user::UserRole;
use civicpulse_realtime::connection::Frame;
use civicpulse_realtime::{ProcessOutcome, RealtimeEngine, Topic};

struct Pipeline {
    engine: RealtimeEngine,
    store: Arc<MemoryNotificationStore>,
    directory: Arc<MemoryStaffDirectory>,
}

fn pipeline() -> Pipeline {
    let realtime = RealtimeConfig {
        push_unread_count: false,
        ..RealtimeConfig::default()
    };
    let store = Arc::new(MemoryNotificationStore::new());
    let directory = Arc::new(MemoryStaffDirectory::new());
    let engine = RealtimeEngine::new(
        &realtime,
        &NotificationsConfig::default(),
        store.clone(),
        directory.clone(),
    );
    Pipeline {
        engine,
        store,
        directory,
    }
}

fn subscribe(
    engine: &RealtimeEngine,
    user: i64,
    role: UserRole,
    dept: Option<i64>,
) -> mpsc::Receiver<Frame> {
    let (sub, rx) = engine
        .registry
        .open(UserId(user), role, dept.map(DepartmentId));
    assert!(engine.registry.register(sub));
    rx
}

fn drain(rx: &mut mpsc::Receiver<Frame>) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(serde_json::from_str(&frame).unwrap());
    }
    frames
}

#[tokio::test]
async fn test_status_change_for_offline_reporter() {
    let p = pipeline();
    let mut other = subscribe(&p.engine, 8, UserRole::Citizen, None);

    let outcome = p
        .engine
        .process(
            Topic::StatusChange,
            Some("1-0"),
            br#"{"report_id":42,"new_status":"resolved","user_id":7}"#,
        )
        .await;

    let ProcessOutcome::Dispatched(summary) = outcome else {
        panic!("expected dispatch, got {outcome:?}");
    };
    assert_eq!(summary.delivered, 0);

    let stored = p.store.all().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].user_id, UserId(7));
    assert_eq!(stored[0].kind, NotificationKind::StatusUpdate);
    assert_eq!(stored[0].report_id, Some(ReportId(42)));
    assert!(!stored[0].is_read);
    assert_eq!(p.store.count_unread(UserId(7)).await.unwrap(), 1);
    assert!(drain(&mut other).is_empty());
}

#[tokio::test]
async fn test_status_change_reaches_every_connection_of_reporter() {
    let p = pipeline();
    let mut phone = subscribe(&p.engine, 7, UserRole::Citizen, None);
    let mut laptop = subscribe(&p.engine, 7, UserRole::Citizen, None);

    p.engine
        .process(
            Topic::StatusChange,
            Some("2-0"),
            br#"{"report_id":42,"new_status":"resolved","user_id":7}"#,
        )
        .await;

    for rx in [&mut phone, &mut laptop] {
        let frames = drain(rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["kind"], "status_update");
        assert_eq!(frames[0]["report_id"], 42);
    }
}

#[tokio::test]
async fn test_escalation_stores_one_record_per_staff_member() {
    let p = pipeline();
    for (id, name) in [(11, "ana"), (12, "budi"), (13, "citra")] {
        p.directory.add_staff(DepartmentId(100), UserId(id), name);
    }
    let mut online = subscribe(&p.engine, 11, UserRole::Government, Some(100));
    let mut citizen = subscribe(&p.engine, 7, UserRole::Citizen, Some(100));

    p.engine
        .process(
            Topic::Escalation,
            Some("3-0"),
            br#"{"report_id":42,"from_department_id":200,"to_department_id":100}"#,
        )
        .await;

    let stored = p.store.all().await;
    assert_eq!(stored.len(), 3);
    let mut recipients: Vec<i64> = stored.iter().map(|n| n.user_id.get()).collect();
    recipients.sort_unstable();
    assert_eq!(recipients, vec![11, 12, 13]);
    assert!(stored.iter().all(|n| n.kind == NotificationKind::ReportEscalated));

    assert_eq!(drain(&mut online).len(), 1);
    assert!(drain(&mut citizen).is_empty());
}

#[tokio::test]
async fn test_malformed_payload_does_not_stall_the_topic() {
    let p = pipeline();
    let mut rx = subscribe(&p.engine, 7, UserRole::Citizen, None);

    let bad = p.engine.process(Topic::Response, Some("4-0"), b"{oops").await;
    assert!(matches!(bad, ProcessOutcome::Rejected(_)));

    let good = p
        .engine
        .process(
            Topic::Response,
            Some("4-1"),
            br#"{"report_id":3,"reporter_id":7,"responded_by":11}"#,
        )
        .await;
    assert!(matches!(good, ProcessOutcome::Dispatched(_)));
    assert_eq!(drain(&mut rx).len(), 1);

    let snapshot = p.engine.metrics.snapshot();
    assert_eq!(snapshot.events_malformed, 1);
    assert_eq!(snapshot.events_processed, 1);
}

#[tokio::test]
async fn test_redelivered_message_yields_one_notification() {
    let p = pipeline();
    let payload = br#"{"request_id":"r-1","status":"success","user_id":7}"#;

    for _ in 0..3 {
        p.engine.process(Topic::Submission, Some("5-0"), payload).await;
    }

    assert_eq!(p.store.count_total(UserId(7)).await.unwrap(), 1);
}

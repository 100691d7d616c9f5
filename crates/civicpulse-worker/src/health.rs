//! Per-consumer health, surfaced by the readiness endpoint.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use civicpulse_core::error::AppError;
use civicpulse_realtime::Topic;

/// Live health of one stream consumer.
#[derive(Debug)]
pub struct ConsumerHealth {
    topic: Topic,
    stream: String,
    attached: AtomicBool,
    consecutive_failures: AtomicU32,
    processed: AtomicU64,
    last_error: Mutex<Option<(String, DateTime<Utc>)>>,
}

/// Serializable view of [`ConsumerHealth`].
#[derive(Debug, Clone, Serialize)]
pub struct ConsumerStatus {
    pub topic: &'static str,
    pub stream: String,
    pub attached: bool,
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub processed: u64,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

impl ConsumerHealth {
    /// Health for a consumer that has not attached yet.
    pub fn new(topic: Topic, stream: impl Into<String>) -> Self {
        Self {
            topic,
            stream: stream.into(),
            attached: AtomicBool::new(false),
            consecutive_failures: AtomicU32::new(0),
            processed: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    /// Topic consumed.
    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub(crate) fn mark_attached(&self) {
        self.attached.store(true, Ordering::SeqCst);
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    pub(crate) fn mark_detached(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }

    pub(crate) fn record_success(&self, messages: usize) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.processed.fetch_add(messages as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self, error: &AppError) -> u32 {
        let mut last = self.last_error.lock().unwrap_or_else(|e| e.into_inner());
        *last = Some((error.to_string(), Utc::now()));
        self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Attached and not currently failing.
    pub fn is_healthy(&self) -> bool {
        self.attached.load(Ordering::SeqCst) && self.consecutive_failures.load(Ordering::SeqCst) == 0
    }

    /// Snapshot for reporting.
    pub fn status(&self) -> ConsumerStatus {
        let last = self
            .last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        ConsumerStatus {
            topic: self.topic.as_str(),
            stream: self.stream.clone(),
            attached: self.attached.load(Ordering::SeqCst),
            healthy: self.is_healthy(),
            consecutive_failures: self.consecutive_failures.load(Ordering::SeqCst),
            processed: self.processed.load(Ordering::Relaxed),
            last_error_at: last.as_ref().map(|(_, at)| *at),
            last_error: last.map(|(msg, _)| msg),
        }
    }
}

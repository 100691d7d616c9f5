//! Suppression of redelivered upstream messages within a time window.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::bridge::Topic;

/// Remembers recently processed `(topic, message id)` pairs.
///
/// At-least-once consumption can hand the same message back after a
/// restart or a failed acknowledgement. A message seen again inside the
/// window is reported as a duplicate and not dispatched twice.
#[derive(Debug)]
pub struct EventDeduplicator {
    window: Duration,
    last_seen: Mutex<HashMap<String, Instant>>,
}

impl EventDeduplicator {
    /// Create a deduplicator. A zero window disables suppression.
    pub fn new(window_ms: u64) -> Self {
        Self {
            window: Duration::from_millis(window_ms),
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Record the message and return `true` if it should be processed,
    /// `false` if it was already seen within the window.
    pub fn should_dispatch(&self, topic: Topic, message_id: &str) -> bool {
        if self.window.is_zero() {
            return true;
        }
        let key = Self::make_key(topic, message_id);
        let now = Instant::now();
        let mut map = self.last_seen.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(last) = map.get(&key) {
            if now.duration_since(*last) < self.window {
                return false;
            }
        }
        map.insert(key, now);
        true
    }

    /// Drop entries older than the window. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let mut map = self.last_seen.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let before = map.len();
        map.retain(|_, seen| now.duration_since(*seen) < self.window);
        before - map.len()
    }

    /// Number of tracked messages.
    pub fn len(&self) -> usize {
        self.last_seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn make_key(topic: Topic, message_id: &str) -> String {
        format!("{}:{}", topic.as_str(), message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_redelivery_suppressed_within_window() {
        let dedup = EventDeduplicator::new(1_000);
        assert!(dedup.should_dispatch(Topic::StatusChange, "1-0"));
        assert!(!dedup.should_dispatch(Topic::StatusChange, "1-0"));
        // Same id on another topic is a different message.
        assert!(dedup.should_dispatch(Topic::Media, "1-0"));

        tokio::time::advance(Duration::from_millis(1_001)).await;
        assert!(dedup.should_dispatch(Topic::StatusChange, "1-0"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_drops_expired_entries() {
        let dedup = EventDeduplicator::new(100);
        dedup.should_dispatch(Topic::Submission, "a");
        tokio::time::advance(Duration::from_millis(150)).await;
        dedup.should_dispatch(Topic::Submission, "b");

        assert_eq!(dedup.cleanup(), 1);
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_zero_window_disables_suppression() {
        let dedup = EventDeduplicator::new(0);
        assert!(dedup.should_dispatch(Topic::Response, "x"));
        assert!(dedup.should_dispatch(Topic::Response, "x"));
        assert!(dedup.is_empty());
    }
}

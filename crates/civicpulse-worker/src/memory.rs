//! In-process event source for tests and local runs without Redis.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use civicpulse_core::error::AppError;
use civicpulse_core::result::AppResult;

use crate::source::{EventSource, StreamMessage};

#[derive(Debug, Default)]
struct State {
    ready: VecDeque<StreamMessage>,
    pending: Vec<StreamMessage>,
    acked: Vec<String>,
}

/// Queue-backed source with consumer-group semantics: read messages stay
/// pending until acknowledged, and [`redeliver_pending`] puts them back.
///
/// [`redeliver_pending`]: MemoryEventSource::redeliver_pending
#[derive(Debug)]
pub struct MemoryEventSource {
    name: String,
    state: Mutex<State>,
    failures: AtomicU32,
    idle_wait: Duration,
}

impl MemoryEventSource {
    /// Create an empty source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(State::default()),
            failures: AtomicU32::new(0),
            idle_wait: Duration::from_millis(10),
        }
    }

    /// Append a message.
    pub fn push(&self, id: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.lock().ready.push_back(StreamMessage::new(id, payload));
    }

    /// Make the next `count` reads fail.
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Requeue every unacknowledged message, as a consumer restart would.
    pub fn redeliver_pending(&self) {
        let mut state = self.lock();
        let pending = std::mem::take(&mut state.pending);
        for msg in pending.into_iter().rev() {
            state.ready.push_front(msg);
        }
    }

    /// Ids acknowledged so far, in order.
    pub fn acked(&self) -> Vec<String> {
        self.lock().acked.clone()
    }

    /// Messages read but not yet acknowledged.
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Messages not yet read.
    pub fn backlog(&self) -> usize {
        self.lock().ready.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl EventSource for MemoryEventSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attach(&self) -> AppResult<()> {
        Ok(())
    }

    async fn next_batch(&self) -> AppResult<Vec<StreamMessage>> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::stream(format!("{} unavailable", self.name)));
        }

        let batch: Vec<StreamMessage> = {
            let mut state = self.lock();
            let batch: Vec<StreamMessage> = state.ready.drain(..).collect();
            state.pending.extend(batch.iter().cloned());
            batch
        };
        if batch.is_empty() {
            tokio::time::sleep(self.idle_wait).await;
        }
        Ok(batch)
    }

    async fn ack(&self, id: &str) -> AppResult<()> {
        let mut state = self.lock();
        state.pending.retain(|m| m.id != id);
        state.acked.push(id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unacked_messages_are_redelivered() {
        let source = MemoryEventSource::new("test");
        source.push("1-0", b"a".to_vec());
        source.push("2-0", b"b".to_vec());

        let batch = source.next_batch().await.unwrap();
        assert_eq!(batch.len(), 2);
        source.ack("1-0").await.unwrap();

        source.redeliver_pending();
        let again = source.next_batch().await.unwrap();
        assert_eq!(again, vec![StreamMessage::new("2-0", b"b".to_vec())]);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let source = MemoryEventSource::new("test");
        source.fail_next(2);
        assert!(source.next_batch().await.is_err());
        assert!(source.next_batch().await.is_err());
        assert!(source.next_batch().await.is_ok());
    }
}

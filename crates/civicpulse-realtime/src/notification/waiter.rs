//! One-shot waits on submission outcomes, keyed by request id.
//!
//! A client that queued a report submission can hold a request open until
//! the worker publishes the outcome for its request id. Each id has at most
//! one waiter; registering again replaces the previous one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::debug;

use civicpulse_entity::event::SubmissionEvent;

#[derive(Debug)]
struct Slot {
    token: u64,
    sender: oneshot::Sender<SubmissionEvent>,
}

/// Registry of pending submission waits.
#[derive(Debug, Default)]
pub struct SubmissionWaiters {
    slots: DashMap<String, Slot>,
    next_token: AtomicU64,
}

impl SubmissionWaiters {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wait for `request_id`.
    ///
    /// The returned guard removes the registration when dropped, so a
    /// caller that times out or goes away leaves nothing behind.
    pub fn register(self: &Arc<Self>, request_id: &str) -> SubmissionWait {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        if self
            .slots
            .insert(request_id.to_string(), Slot { token, sender })
            .is_some()
        {
            debug!(request_id, "Replacing an earlier wait on the same request id");
        }
        SubmissionWait {
            request_id: request_id.to_string(),
            token,
            receiver: Some(receiver),
            waiters: Arc::clone(self),
        }
    }

    /// Complete the wait registered for the event's request id, if any.
    /// Returns whether a waiter was found.
    pub fn deliver(&self, event: &SubmissionEvent) -> bool {
        if event.request_id.is_empty() {
            return false;
        }
        let Some((_, slot)) = self.slots.remove(&event.request_id) else {
            return false;
        };
        // The waiter may have gone away between lookup and send.
        let delivered = slot.sender.send(event.clone()).is_ok();
        debug!(request_id = %event.request_id, delivered, "Submission outcome handed to waiter");
        delivered
    }

    /// Whether a wait is registered for `request_id`.
    pub fn is_waiting(&self, request_id: &str) -> bool {
        self.slots.contains_key(request_id)
    }

    /// Number of registered waits.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no wait is registered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn release(&self, request_id: &str, token: u64) {
        self.slots.remove_if(request_id, |_, slot| slot.token == token);
    }
}

/// A registered wait. Unregisters itself on drop.
#[derive(Debug)]
pub struct SubmissionWait {
    request_id: String,
    token: u64,
    receiver: Option<oneshot::Receiver<SubmissionEvent>>,
    waiters: Arc<SubmissionWaiters>,
}

impl SubmissionWait {
    /// Wait for the outcome. `None` when the wait was replaced by a newer
    /// registration for the same id.
    pub async fn outcome(&mut self) -> Option<SubmissionEvent> {
        let receiver = self.receiver.take()?;
        receiver.await.ok()
    }
}

impl Drop for SubmissionWait {
    fn drop(&mut self) {
        self.waiters.release(&self.request_id, self.token);
    }
}

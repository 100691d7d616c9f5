//! Individual subscriber connection handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;

use civicpulse_core::types::id::{DepartmentId, UserId};
use civicpulse_entity::user::UserRole;

/// Unique subscriber identifier.
pub type SubscriberId = Uuid;

/// A serialized frame waiting in an outbound queue. Shared so a broadcast
/// serializes once for every recipient.
pub type Frame = Arc<str>;

/// Lifecycle of a subscriber connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Identity resolved, not yet in the registry.
    Connecting = 0,
    /// Present in the registry and receiving deliveries.
    Registered = 1,
    /// Removed from the registry, teardown in progress.
    Unregistering = 2,
    /// Both loops stopped.
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Registered,
            2 => Self::Unregistering,
            _ => Self::Closed,
        }
    }
}

/// Result of offering a frame to a subscriber's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The frame was queued.
    Queued,
    /// The queue is at capacity.
    Full,
    /// The writer has gone away.
    Closed,
}

/// One live push connection.
///
/// Role and department are captured when the connection is opened and are
/// never refreshed; a role change takes effect on reconnect.
#[derive(Debug)]
pub struct Subscriber {
    /// Unique connection id.
    pub id: SubscriberId,
    /// Resolved identity.
    pub user_id: UserId,
    /// Role at connect time.
    pub role: UserRole,
    /// Department at connect time.
    pub department_id: Option<DepartmentId>,
    /// When the connection was opened.
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<Frame>,
    state: AtomicU8,
    cancel: CancellationToken,
}

impl Subscriber {
    /// Create a subscriber in the `Connecting` state together with the
    /// receiving end of its bounded outbound queue.
    pub fn new(
        user_id: UserId,
        role: UserRole,
        department_id: Option<DepartmentId>,
        queue_capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        let (sender, rx) = mpsc::channel(queue_capacity.max(1));
        let subscriber = Arc::new(Self {
            id: Uuid::new_v4(),
            user_id,
            role,
            department_id,
            connected_at: Utc::now(),
            sender,
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            cancel: CancellationToken::new(),
        });
        (subscriber, rx)
    }

    /// Offer a frame without waiting.
    pub fn try_send(&self, frame: Frame) -> SendOutcome {
        if self.state() != ConnectionState::Registered {
            return SendOutcome::Closed;
        }
        match self.sender.try_send(frame) {
            Ok(()) => SendOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => SendOutcome::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Atomically move from `from` to `to`. Returns `false` if the
    /// subscriber was not in `from`.
    pub(crate) fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Stop both pump loops and mark the connection closed.
    pub(crate) fn close(&self) {
        self.cancel.cancel();
        self.state
            .store(ConnectionState::Closed as u8, Ordering::Release);
    }

    /// Resolves once the connection has been closed.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Whether teardown has started.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether this connection belongs to a staff member of `department_id`.
    pub fn is_staff_of(&self, department_id: DepartmentId) -> bool {
        self.role.is_staff() && self.department_id == Some(department_id)
    }
}

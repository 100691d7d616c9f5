//! Notification routing, redelivery suppression, and submission waits.

pub mod dedup;
pub mod router;
pub mod waiter;

pub use dedup::EventDeduplicator;
pub use router::{DispatchOutcome, DispatchRouter, DispatchSummary};
pub use waiter::{SubmissionWait, SubmissionWaiters};

//! # civicpulse-realtime
//!
//! Real-time push engine for CivicPulse. Provides:
//!
//! - Subscriber registry with per-user, role, and department targeting
//! - Bounded per-connection delivery queues with a configurable
//!   backpressure policy
//! - Typed upstream events and their mapping to notifications
//! - Persist-then-push dispatch with redelivery suppression
//! - One-shot waits on submission outcomes by request id

pub mod bridge;
pub mod connection;
pub mod message;
pub mod metrics;
pub mod notification;
pub mod server;

pub use bridge::{AdapterError, Topic, UpstreamEvent};
pub use connection::SubscriberRegistry;
pub use notification::{DispatchRouter, SubmissionWait, SubmissionWaiters};
pub use server::{ProcessOutcome, RealtimeEngine};

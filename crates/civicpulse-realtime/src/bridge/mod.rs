//! Upstream event bridge: typed events and their mapping to notifications.

pub mod adapter;
pub mod event;

pub use adapter::{Announcement, DispatchPlan, EventAdapter, fan_out_escalation, status_phrase};
pub use event::{AdapterError, Topic, UpstreamEvent};

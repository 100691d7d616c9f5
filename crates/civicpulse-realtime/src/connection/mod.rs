//! Subscriber connections: handles, the live registry, and the per-connection
//! delivery pump.

pub mod handle;
pub mod pump;
pub mod registry;

pub use handle::{ConnectionState, Frame, SendOutcome, Subscriber, SubscriberId};
pub use pump::{InboundFrame, PumpConfig};
pub use registry::{DeliveryReport, SubscriberRegistry};

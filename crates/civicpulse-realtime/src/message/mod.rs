//! Wire messages exchanged over the push connection.

pub mod serializer;
pub mod types;

pub use types::{InboundMessage, OutboundMessage};

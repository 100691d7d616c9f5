//! JSON serialization for push messages.

use std::sync::Arc;

use super::types::{InboundMessage, OutboundMessage};

/// Serialize an outbound message into a shareable frame.
pub fn encode(msg: &OutboundMessage) -> Result<Arc<str>, serde_json::Error> {
    serde_json::to_string(msg).map(Arc::from)
}

/// Deserialize an inbound message. A bare `ping` text is accepted as a ping.
pub fn decode_inbound(text: &str) -> Result<InboundMessage, serde_json::Error> {
    if text.trim().eq_ignore_ascii_case("ping") {
        return Ok(InboundMessage::Ping { timestamp: None });
    }
    serde_json::from_str(text)
}

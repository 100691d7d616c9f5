//! Event source abstraction: an at-least-once stream of raw messages.

use async_trait::async_trait;

use civicpulse_core::config::StreamsConfig;
use civicpulse_core::result::AppResult;
use civicpulse_realtime::Topic;

/// One raw message read from an upstream stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    /// Stream-assigned id, used for acknowledgement and deduplication.
    pub id: String,
    /// Undecoded JSON payload.
    pub payload: Vec<u8>,
}

impl StreamMessage {
    /// Build a message.
    pub fn new(id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
        }
    }
}

/// A consumer-group style source.
///
/// Messages handed out by [`next_batch`](Self::next_batch) stay pending until
/// acknowledged, and unacknowledged messages are handed out again after a
/// restart.
#[async_trait]
pub trait EventSource: Send + Sync + std::fmt::Debug + 'static {
    /// Human-readable name of the underlying stream.
    fn name(&self) -> &str;

    /// Prepare the source for reading, creating server-side state if needed.
    async fn attach(&self) -> AppResult<()>;

    /// Wait for the next batch. An empty batch means the wait timed out.
    async fn next_batch(&self) -> AppResult<Vec<StreamMessage>>;

    /// Acknowledge a processed message.
    async fn ack(&self, id: &str) -> AppResult<()>;
}

/// Stream key configured for a topic.
pub fn stream_key(config: &StreamsConfig, topic: Topic) -> &str {
    match topic {
        Topic::Submission => &config.submission,
        Topic::Media => &config.media,
        Topic::ReportCreated => &config.report_created,
        Topic::StatusChange => &config.status_change,
        Topic::Assignment => &config.assignment,
        Topic::Escalation => &config.escalation,
        Topic::Response => &config.response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_topic_has_a_distinct_stream() {
        let config = StreamsConfig::default();
        let mut keys: Vec<&str> = Topic::ALL.iter().map(|t| stream_key(&config, *t)).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), Topic::ALL.len());
    }
}

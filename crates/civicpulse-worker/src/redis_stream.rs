//! Redis Streams consumer-group source.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::StreamReadReply;
use tracing::{debug, info};

use civicpulse_core::config::RedisConfig;
use civicpulse_core::error::{AppError, ErrorKind};
use civicpulse_core::result::AppResult;

use crate::source::{EventSource, StreamMessage};

/// Entry field holding the JSON payload.
pub const PAYLOAD_FIELD: &str = "payload";

/// Reads one stream through a consumer group.
///
/// After attaching, the consumer's own pending entries (delivered before a
/// restart but never acknowledged) are drained first. Only then does it
/// switch to new entries.
#[derive(Clone)]
pub struct RedisStreamSource {
    conn: ConnectionManager,
    stream: String,
    group: String,
    consumer: String,
    block_ms: u64,
    batch_size: usize,
    draining_pending: std::sync::Arc<AtomicBool>,
}

impl std::fmt::Debug for RedisStreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStreamSource")
            .field("stream", &self.stream)
            .field("group", &self.group)
            .field("consumer", &self.consumer)
            .finish()
    }
}

impl RedisStreamSource {
    /// Create a source for `stream` using the group settings in `config`.
    pub fn new(conn: ConnectionManager, stream: &str, config: &RedisConfig) -> Self {
        Self {
            conn,
            stream: stream.to_string(),
            group: config.consumer_group.clone(),
            consumer: config.consumer_name.clone(),
            block_ms: config.block_ms,
            batch_size: config.batch_size.max(1),
            draining_pending: std::sync::Arc::new(AtomicBool::new(true)),
        }
    }

    async fn read(&self, from: &str) -> AppResult<Vec<StreamMessage>> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(&self.group)
            .arg(&self.consumer)
            .arg("COUNT")
            .arg(self.batch_size);
        // Pending entries are returned immediately; only new ones block.
        if from == ">" {
            cmd.arg("BLOCK").arg(self.block_ms);
        }
        cmd.arg("STREAMS").arg(&self.stream).arg(from);

        let reply: Option<StreamReadReply> = cmd.query_async(&mut conn).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Stream,
                format!("XREADGROUP on '{}' failed", self.stream),
                e,
            )
        })?;

        let mut messages = Vec::new();
        for key in reply.unwrap_or_default().keys {
            for entry in key.ids {
                let payload = entry.get::<Vec<u8>>(PAYLOAD_FIELD).unwrap_or_default();
                messages.push(StreamMessage::new(entry.id, payload));
            }
        }
        Ok(messages)
    }
}

#[async_trait]
impl EventSource for RedisStreamSource {
    fn name(&self) -> &str {
        &self.stream
    }

    async fn attach(&self) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let created: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream)
            .arg(&self.group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match created {
            Ok(()) => {
                info!(stream = %self.stream, group = %self.group, "Consumer group created");
            }
            Err(e) if e.code() == Some("BUSYGROUP") => {
                debug!(stream = %self.stream, group = %self.group, "Consumer group exists");
            }
            Err(e) => {
                return Err(AppError::with_source(
                    ErrorKind::Stream,
                    format!("XGROUP CREATE on '{}' failed", self.stream),
                    e,
                ));
            }
        }
        self.draining_pending.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn next_batch(&self) -> AppResult<Vec<StreamMessage>> {
        if self.draining_pending.load(Ordering::SeqCst) {
            let pending = self.read("0").await?;
            if !pending.is_empty() {
                debug!(stream = %self.stream, count = pending.len(), "Replaying pending entries");
                return Ok(pending);
            }
            self.draining_pending.store(false, Ordering::SeqCst);
        }
        self.read(">").await
    }

    async fn ack(&self, id: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("XACK")
            .arg(&self.stream)
            .arg(&self.group)
            .arg(id)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Stream,
                    format!("XACK on '{}' failed", self.stream),
                    e,
                )
            })?;
        Ok(())
    }
}

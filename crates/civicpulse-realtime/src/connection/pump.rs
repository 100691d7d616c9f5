//! Delivery pump: the writer and reader loops of one connection.
//!
//! Both loops are transport-neutral. The writer drains the subscriber's
//! queue into any `Sink<String>`; the reader consumes any stream of
//! [`InboundFrame`]s. The WebSocket handler adapts axum's socket halves to
//! these shapes.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::message::serializer;
use crate::message::types::{InboundMessage, OutboundMessage};

use super::handle::{Frame, SendOutcome, Subscriber};
use super::registry::SubscriberRegistry;

/// A frame received from the client, stripped of transport detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Application text.
    Text(String),
    /// Client-initiated close.
    Close,
    /// Transport keepalive or binary data, ignored.
    Other,
}

/// Pump timing.
#[derive(Debug, Clone, Copy)]
pub struct PumpConfig {
    /// Interval between heartbeat pings. Zero disables them.
    pub ping_interval: Duration,
}

/// Run both loops until the connection closes, then make sure the
/// subscriber is unregistered.
pub async fn drive<W, R, E>(
    subscriber: Arc<Subscriber>,
    registry: Arc<SubscriberRegistry>,
    queue: mpsc::Receiver<Frame>,
    sink: W,
    stream: R,
    config: PumpConfig,
) where
    W: Sink<String> + Unpin + Send + 'static,
    W::Error: Display + Send,
    R: Stream<Item = Result<InboundFrame, E>> + Unpin,
    E: Display,
{
    let writer = tokio::spawn(run_writer(
        subscriber.clone(),
        registry.clone(),
        queue,
        sink,
        config,
    ));

    run_reader(subscriber.clone(), registry.clone(), stream).await;

    registry.unregister(&subscriber.id);
    if let Err(e) = writer.await {
        warn!(conn_id = %subscriber.id, error = %e, "Writer task failed");
    }
}

/// Drain the outbound queue onto the connection. Any write failure
/// unregisters the subscriber.
pub async fn run_writer<W>(
    subscriber: Arc<Subscriber>,
    registry: Arc<SubscriberRegistry>,
    mut queue: mpsc::Receiver<Frame>,
    mut sink: W,
    config: PumpConfig,
) where
    W: Sink<String> + Unpin,
    W::Error: Display,
{
    let heartbeat_enabled = !config.ping_interval.is_zero();
    let period = if heartbeat_enabled {
        config.ping_interval
    } else {
        Duration::from_secs(3600)
    };
    let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let outgoing = tokio::select! {
            biased;
            _ = subscriber.closed() => break,
            frame = queue.recv() => match frame {
                Some(frame) => frame.to_string(),
                None => break,
            },
            _ = heartbeat.tick(), if heartbeat_enabled => {
                match serializer::encode(&OutboundMessage::Ping { timestamp: Utc::now().timestamp() }) {
                    Ok(frame) => frame.to_string(),
                    Err(_) => continue,
                }
            }
        };

        if let Err(e) = sink.send(outgoing).await {
            warn!(conn_id = %subscriber.id, error = %e, "Write failed, unregistering subscriber");
            registry.unregister(&subscriber.id);
            break;
        }
    }

    let _ = sink.close().await;
    debug!(conn_id = %subscriber.id, "Writer stopped");
}

/// Watch the read side for client frames and teardown.
pub async fn run_reader<R, E>(subscriber: Arc<Subscriber>, registry: Arc<SubscriberRegistry>, mut stream: R)
where
    R: Stream<Item = Result<InboundFrame, E>> + Unpin,
    E: Display,
{
    loop {
        let next = tokio::select! {
            _ = subscriber.closed() => break,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(InboundFrame::Text(text))) => handle_client_text(&subscriber, &text),
            Some(Ok(InboundFrame::Other)) => {}
            Some(Ok(InboundFrame::Close)) | None => {
                debug!(conn_id = %subscriber.id, "Client closed connection");
                break;
            }
            Some(Err(e)) => {
                debug!(conn_id = %subscriber.id, error = %e, "Read failed");
                break;
            }
        }
    }

    registry.unregister(&subscriber.id);
}

fn handle_client_text(subscriber: &Subscriber, text: &str) {
    let reply = match serializer::decode_inbound(text) {
        Ok(InboundMessage::Ping { timestamp }) => OutboundMessage::Pong {
            timestamp: timestamp.unwrap_or_else(|| Utc::now().timestamp()),
        },
        Err(e) => OutboundMessage::Error {
            code: "INVALID_MESSAGE".to_string(),
            message: format!("Failed to parse message: {e}"),
        },
    };

    match serializer::encode(&reply) {
        Ok(frame) => {
            if subscriber.try_send(frame) != SendOutcome::Queued {
                debug!(conn_id = %subscriber.id, "Reply dropped, outbound queue unavailable");
            }
        }
        Err(e) => warn!(conn_id = %subscriber.id, error = %e, "Failed to serialize reply"),
    }
}

//! Stream consumer: reads one topic, routes each message, then acknowledges.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{Level, debug, info, warn};

use civicpulse_core::error::AppError;
use civicpulse_realtime::{ProcessOutcome, RealtimeEngine, Topic};

use crate::health::ConsumerHealth;
use crate::source::{EventSource, StreamMessage};

/// Consecutive read failures logged at debug before escalating to warn.
const QUIET_FAILURES: u32 = 3;

/// Log level for the given count of consecutive read failures.
fn failure_level(failures: u32) -> Level {
    if failures > QUIET_FAILURES {
        Level::WARN
    } else {
        Level::DEBUG
    }
}

/// Exponential backoff between failed reads.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// Start at `base_ms`, doubling up to `max_ms`.
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        let base = Duration::from_millis(base_ms.max(1));
        Self {
            base,
            max: Duration::from_millis(max_ms).max(base),
            current: base,
        }
    }

    /// Delay to wait now; the following call returns double, capped.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    /// Back to the base delay.
    pub fn reset(&mut self) {
        self.current = self.base;
    }
}

/// Consumes one upstream topic until cancelled.
///
/// Every message is acknowledged after it has been processed, whatever the
/// outcome: malformed or unroutable payloads are logged and dropped rather
/// than retried forever. A batch that has started is always finished before
/// cancellation is honoured.
#[derive(Debug)]
pub struct StreamConsumer {
    topic: Topic,
    source: Arc<dyn EventSource>,
    engine: RealtimeEngine,
    health: Arc<ConsumerHealth>,
    backoff: Backoff,
}

impl StreamConsumer {
    /// Create a consumer.
    pub fn new(
        topic: Topic,
        source: Arc<dyn EventSource>,
        engine: RealtimeEngine,
        health: Arc<ConsumerHealth>,
        backoff: Backoff,
    ) -> Self {
        Self {
            topic,
            source,
            engine,
            health,
            backoff,
        }
    }

    /// Run until `cancel` turns true or its sender is dropped.
    pub async fn run(mut self, mut cancel: watch::Receiver<bool>) {
        info!(topic = %self.topic, stream = self.source.name(), "Consumer started");
        let mut attached = false;

        loop {
            if *cancel.borrow() {
                break;
            }

            if !attached {
                match self.source.attach().await {
                    Ok(()) => {
                        attached = true;
                        self.health.mark_attached();
                        self.backoff.reset();
                        info!(topic = %self.topic, stream = self.source.name(), "Consumer attached");
                    }
                    Err(e) => {
                        if self.wait_after_failure(&e, &mut cancel).await {
                            break;
                        }
                        continue;
                    }
                }
            }

            let batch = tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                    continue;
                }
                batch = self.source.next_batch() => batch,
            };

            match batch {
                Ok(messages) => {
                    self.backoff.reset();
                    let count = messages.len();
                    for message in messages {
                        self.handle(message).await;
                    }
                    self.health.record_success(count);
                }
                Err(e) => {
                    if self.wait_after_failure(&e, &mut cancel).await {
                        break;
                    }
                }
            }
        }

        self.health.mark_detached();
        info!(topic = %self.topic, "Consumer stopped");
    }

    async fn handle(&self, message: StreamMessage) {
        let outcome = self
            .engine
            .process(self.topic, Some(&message.id), &message.payload)
            .await;
        if let ProcessOutcome::Rejected(_) = outcome {
            debug!(topic = %self.topic, message_id = %message.id, "Dropping rejected message");
        }

        if let Err(e) = self.source.ack(&message.id).await {
            // Left pending; redelivery is absorbed by the deduplicator.
            warn!(topic = %self.topic, message_id = %message.id, error = %e, "Acknowledgement failed");
        }
    }

    /// Record the failure and sleep out the backoff. Returns `true` if
    /// cancellation arrived while waiting.
    async fn wait_after_failure(
        &mut self,
        error: &AppError,
        cancel: &mut watch::Receiver<bool>,
    ) -> bool {
        let failures = self.health.record_failure(error);
        let delay = self.backoff.next_delay();
        let retry_in_ms = delay.as_millis() as u64;
        if failure_level(failures) == Level::WARN {
            warn!(
                topic = %self.topic,
                stream = self.source.name(),
                error = %error,
                failures,
                retry_in_ms,
                "Stream read keeps failing, backing off"
            );
        } else {
            debug!(
                topic = %self.topic,
                stream = self.source.name(),
                error = %error,
                failures,
                retry_in_ms,
                "Stream read failed, backing off"
            );
        }

        tokio::select! {
            changed = cancel.changed() => changed.is_err() || *cancel.borrow(),
            _ = tokio::time::sleep(delay) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = Backoff::new(500, 3_000);
        let delays: Vec<u64> = (0..5).map(|_| backoff.next_delay().as_millis() as u64).collect();
        assert_eq!(delays, vec![500, 1_000, 2_000, 3_000, 3_000]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_transient_failures_logged_quietly_first() {
        assert_eq!(failure_level(1), Level::DEBUG);
        assert_eq!(failure_level(QUIET_FAILURES), Level::DEBUG);
        assert_eq!(failure_level(QUIET_FAILURES + 1), Level::WARN);
    }

    #[test]
    fn test_backoff_max_never_below_base() {
        let mut backoff = Backoff::new(1_000, 10);
        assert_eq!(backoff.next_delay(), Duration::from_millis(1_000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1_000));
    }
}

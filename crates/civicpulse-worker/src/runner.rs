//! Consumer fleet: one stream consumer per topic, stopped together.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use civicpulse_core::config::StreamsConfig;
use civicpulse_realtime::{RealtimeEngine, Topic};

use crate::consumer::{Backoff, StreamConsumer};
use crate::health::{ConsumerHealth, ConsumerStatus};
use crate::source::EventSource;

/// Owns the running consumers and their shared cancel signal.
#[derive(Debug)]
pub struct ConsumerFleet {
    engine: RealtimeEngine,
    streams: StreamsConfig,
    cancel_tx: watch::Sender<bool>,
    health: RwLock<Vec<Arc<ConsumerHealth>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ConsumerFleet {
    /// Create an empty fleet. Nothing runs until [`spawn`](Self::spawn).
    pub fn new(engine: RealtimeEngine, streams: StreamsConfig) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            engine,
            streams,
            cancel_tx,
            health: RwLock::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Start a consumer for `topic` reading from `source`.
    pub fn spawn(&self, topic: Topic, source: Arc<dyn EventSource>) {
        let health = Arc::new(ConsumerHealth::new(topic, source.name()));
        let consumer = StreamConsumer::new(
            topic,
            source,
            self.engine.clone(),
            health.clone(),
            Backoff::new(self.streams.backoff_base_ms, self.streams.backoff_max_ms),
        );
        let handle = tokio::spawn(consumer.run(self.cancel_tx.subscribe()));

        self.health
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(health);
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
    }

    /// Periodically drop expired deduplication entries until shutdown.
    pub fn spawn_dedup_sweeper(&self, every: Duration) {
        let dedup = self.engine.dedup.clone();
        let mut cancel = self.cancel_tx.subscribe();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
            loop {
                tokio::select! {
                    changed = cancel.changed() => {
                        if changed.is_err() || *cancel.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let removed = dedup.cleanup();
                        if removed > 0 {
                            debug!(removed, "Expired dedup entries swept");
                        }
                    }
                }
            }
        });
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
    }

    /// Status of every consumer.
    pub fn statuses(&self) -> Vec<ConsumerStatus> {
        self.health
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|h| h.status())
            .collect()
    }

    /// At least one consumer exists and every consumer is attached and
    /// not failing.
    pub fn is_ready(&self) -> bool {
        let health = self.health.read().unwrap_or_else(|e| e.into_inner());
        !health.is_empty() && health.iter().all(|h| h.is_healthy())
    }

    /// Signal every consumer to stop and wait for in-flight batches, up to
    /// `grace`. Tasks still running afterwards are aborted.
    pub async fn shutdown(&self, grace: Duration) {
        let tasks: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *tasks)
        };
        info!(consumers = tasks.len(), "Stopping stream consumers");
        self.cancel_tx.send_replace(true);

        let aborts: Vec<_> = tasks.iter().map(|t| t.abort_handle()).collect();
        let joined = tokio::time::timeout(grace, async {
            for task in tasks {
                if let Err(e) = task.await {
                    warn!(error = %e, "Consumer task failed");
                }
            }
        })
        .await;

        if joined.is_err() {
            warn!(grace_secs = grace.as_secs(), "Consumers did not stop in time, aborting");
            for abort in aborts {
                abort.abort();
            }
        }
        info!("Stream consumers stopped");
    }
}

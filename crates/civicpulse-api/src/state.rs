//! Application state shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Instant;

use civicpulse_auth::JwtDecoder;
use civicpulse_core::config::AppConfig;
use civicpulse_database::{DatabasePool, NotificationStore};
use civicpulse_realtime::RealtimeEngine;
use civicpulse_worker::ConsumerFleet;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    // ── Configuration ────────────────────────────────────────
    /// Application configuration
    pub config: Arc<AppConfig>,

    // ── Infrastructure ───────────────────────────────────────
    /// PostgreSQL pool, absent when running on in-memory gateways
    pub database: Option<DatabasePool>,

    // ── Auth ─────────────────────────────────────────────────
    /// JWT token decoder and validator
    pub jwt_decoder: Arc<JwtDecoder>,

    // ── Realtime ─────────────────────────────────────────────
    /// Push engine
    pub realtime: RealtimeEngine,
    /// Upstream stream consumers
    pub consumers: Arc<ConsumerFleet>,

    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Assemble the state.
    pub fn new(
        config: Arc<AppConfig>,
        database: Option<DatabasePool>,
        jwt_decoder: Arc<JwtDecoder>,
        realtime: RealtimeEngine,
        consumers: Arc<ConsumerFleet>,
    ) -> Self {
        Self {
            config,
            database,
            jwt_decoder,
            realtime,
            consumers,
            started_at: Instant::now(),
        }
    }

    /// Notification store shared with the push engine.
    pub fn store(&self) -> &Arc<dyn NotificationStore> {
        self.realtime.store()
    }
}

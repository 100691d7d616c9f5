//! CivicPulse notification hub
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use tracing_subscriber::{EnvFilter, fmt};

use civicpulse_auth::{JwtDecoder, NoRevocation, RedisRevocationList, RevocationList};
use civicpulse_core::config::AppConfig;
use civicpulse_core::error::{AppError, ErrorKind};
use civicpulse_database::DatabasePool;
use civicpulse_realtime::{RealtimeEngine, Topic};
use civicpulse_worker::{ConsumerFleet, RedisStreamSource, stream_key};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from `config/` and the environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("CIVICPULSE_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting CivicPulse v{}", env!("CARGO_PKG_VERSION"));
    let config = Arc::new(config);

    // ── Step 1: Database ─────────────────────────────────────────
    let db = DatabasePool::connect(&config.database).await?;
    tracing::info!("Database connection established");

    // ── Step 2: Redis ────────────────────────────────────────────
    let redis_client = redis::Client::open(config.redis.url.as_str()).map_err(|e| {
        AppError::with_source(ErrorKind::Configuration, format!("Invalid Redis URL: {e}"), e)
    })?;
    let redis = ConnectionManager::new(redis_client).await.map_err(|e| {
        AppError::with_source(ErrorKind::Stream, format!("Failed to connect to Redis: {e}"), e)
    })?;
    tracing::info!("Redis connection established");

    // ── Step 3: Token validation ─────────────────────────────────
    let revocation: Arc<dyn RevocationList> = if config.auth.check_revocation {
        Arc::new(RedisRevocationList::new(redis.clone()))
    } else {
        Arc::new(NoRevocation)
    };
    let jwt_decoder = Arc::new(JwtDecoder::with_revocation(&config.auth, revocation));

    // ── Step 4: Realtime engine ──────────────────────────────────
    let realtime = RealtimeEngine::new(
        &config.realtime,
        &config.notifications,
        Arc::new(db.notifications()),
        Arc::new(db.directory()),
    );

    // ── Step 5: Stream consumers ─────────────────────────────────
    let fleet = Arc::new(ConsumerFleet::new(realtime.clone(), config.streams.clone()));
    for topic in Topic::ALL {
        let stream = stream_key(&config.streams, topic);
        let source = RedisStreamSource::new(redis.clone(), stream, &config.redis);
        fleet.spawn(topic, Arc::new(source));
    }
    if config.notifications.dedup_window_ms > 0 {
        fleet.spawn_dedup_sweeper(Duration::from_millis(config.notifications.dedup_window_ms));
    }
    tracing::info!(topics = Topic::ALL.len(), "Stream consumers started");

    // ── Step 6: HTTP server ──────────────────────────────────────
    let app_state = civicpulse_api::AppState::new(
        Arc::clone(&config),
        Some(db.clone()),
        jwt_decoder,
        realtime.clone(),
        Arc::clone(&fleet),
    );
    let app = civicpulse_api::build_router(app_state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("CivicPulse listening on {}", addr);

    // ── Step 7: Graceful shutdown ────────────────────────────────
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let server = axum::serve(listener, app).with_graceful_shutdown({
        let fleet = Arc::clone(&fleet);
        let realtime = realtime.clone();
        async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown...");
            // Consumers stop before sockets close.
            fleet.shutdown(grace).await;
            realtime.shutdown();
        }
    });

    server
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    // ── Step 8: Release resources ────────────────────────────────
    db.close().await;

    tracing::info!("CivicPulse shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

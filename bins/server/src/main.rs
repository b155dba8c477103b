//! Daybook API Server
//!
//! Main entry point for the Daybook journal service.

use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use daybook_api::{AppState, create_router};
use daybook_core::storage::{CleanupQueue, CleanupWorker, StorageBackend};
use daybook_db::connect;
use daybook_db::migration::{Migrator, MigratorTrait};
use daybook_shared::{AccessGate, AppConfig, JwtService};

/// How long shutdown waits for queued storage cleanups.
const CLEANUP_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "daybook=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = connect(&config.database).await?;
    info!("Connected to database");

    if config.server.migrate_on_start {
        Migrator::up(&db, None).await?;
        info!("Migrations applied");
    }

    let storage = StorageBackend::from_config(config.storage.clone())?;
    let gate = AccessGate::new(JwtService::new(config.jwt.clone()));

    let (cleanup, receiver) = CleanupQueue::channel();
    let state = AppState::new(db, gate, storage, cleanup)
        .with_request_timeout(Duration::from_secs(config.server.request_timeout_secs));
    let worker = CleanupWorker::new(state.storage.clone(), receiver, &config.cleanup).spawn();

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last queue handles, so the worker now drains and exits.
    if tokio::time::timeout(CLEANUP_DRAIN_TIMEOUT, worker).await.is_err() {
        warn!("Cleanup worker did not finish in time, some objects may remain");
    }

    Ok(())
}

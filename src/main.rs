use migration::MigratorTrait;
use sea_orm::Database;
use std::env;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campus_sync_backend::jobs::engine::SyncEngine;
use campus_sync_backend::jobs::scheduler::spawn_scheduler;
use campus_sync_backend::services::config::OrchestratorConfig;
use campus_sync_backend::services::sync_config_store;
use campus_sync_backend::{app, AppState};

const ENV_BIND_ADDR: &str = "BIND_ADDR";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,campus_sync_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Connect to database
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    tracing::info!("Connecting to database...");
    let db = Database::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    // Seed missing source rows and settle runs cut off by the last restart
    sync_config_store::ensure_defaults(&db)
        .await
        .expect("Failed to seed sync config");
    let recovered = sync_config_store::recover_interrupted(&db)
        .await
        .expect("Failed to recover interrupted runs");
    if recovered > 0 {
        tracing::warn!("Marked {} interrupted sync runs as failed", recovered);
    }

    let config = OrchestratorConfig::from_env();
    let engine = SyncEngine::with_default_adapters(db.clone(), config);
    let scheduler = spawn_scheduler(engine.clone());

    let state = AppState {
        db,
        engine: engine.clone(),
    };
    let router = app(state);

    // Start server
    let bind_addr = env::var(ENV_BIND_ADDR).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind listener");
    tracing::info!("Server listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(engine))
        .await
        .unwrap();

    let _ = scheduler.await;
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal(engine: SyncEngine) {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    tracing::info!("Shutdown requested, stopping background work...");
    engine.shutdown().await;
}

use async_trait::async_trait;
use axum::Router;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;

use campus_sync_backend::jobs::adapters::{AdapterContext, AdapterError, SourceAdapter};
use campus_sync_backend::jobs::engine::SyncEngine;
use campus_sync_backend::models::source::SourceKey;
use campus_sync_backend::services::config::OrchestratorConfig;
use campus_sync_backend::services::sync_config_store;
use campus_sync_backend::{app, AppState};

/// Fresh in-memory database with the full schema applied.
pub async fn setup_test_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:".to_string());
    // a single connection keeps every query on the same in-memory database
    opts.max_connections(1);
    let db = Database::connect(opts)
        .await
        .expect("Test database connection should succeed");
    Migrator::up(&db, None)
        .await
        .expect("Migrations should apply");
    db
}

/// Adapter stub: reports a fixed record count, optionally after a delay
/// during which it honours the stop signal.
pub struct StubAdapter {
    pub key: SourceKey,
    pub records: i64,
    pub delay_ms: u64,
}

#[async_trait]
impl SourceAdapter for StubAdapter {
    fn key(&self) -> SourceKey {
        self.key
    }

    async fn run(&self, ctx: AdapterContext) -> Result<Option<i64>, AdapterError> {
        if self.delay_ms > 0 {
            tokio::select! {
                _ = ctx.stop.triggered() => return Err(AdapterError::Stopped),
                _ = tokio::time::sleep(Duration::from_millis(self.delay_ms)) => {}
            }
        }
        Ok(Some(self.records))
    }
}

/// Full application with stub adapters behind all three sources.
pub async fn build_test_app() -> (Router, AppState) {
    build_test_app_with_delay(0).await
}

pub async fn build_test_app_with_delay(delay_ms: u64) -> (Router, AppState) {
    let db = setup_test_db().await;
    sync_config_store::ensure_defaults(&db)
        .await
        .expect("Seeding sync config should succeed");

    let config = OrchestratorConfig {
        lms_fetch_interval_secs: 1,
        error_backoff_secs: 1,
        stop_join_secs: 2,
        ..Default::default()
    };
    let engine = SyncEngine::new(
        db.clone(),
        config,
        vec![
            Arc::new(StubAdapter {
                key: SourceKey::Faculty,
                records: 12,
                delay_ms,
            }),
            Arc::new(StubAdapter {
                key: SourceKey::Students,
                records: 34,
                delay_ms,
            }),
            Arc::new(StubAdapter {
                key: SourceKey::Lms,
                records: 5,
                delay_ms,
            }),
        ],
    );

    let state = AppState {
        db,
        engine: engine.clone(),
    };
    (app(state.clone()), state)
}

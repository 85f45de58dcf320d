// src/lib.rs

use axum::{routing::get, Router};
use sea_orm::DatabaseConnection;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use jobs::engine::SyncEngine;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub engine: SyncEngine,
}

pub mod entities {
    pub mod prelude;

    pub mod action_log;
    pub mod faculty_members;
    pub mod lms_activity;
    pub mod students;
    pub mod sync_config;
}

pub mod services {
    pub mod action_log;
    pub mod config;
    pub mod progress;
    pub mod sync_config_store;
}

pub mod models {
    pub mod error;
    pub mod source;
    pub mod status;
    pub mod sync;
}

pub mod handlers;
pub mod jobs;

#[cfg(test)]
pub mod testutil;

/// Build the full application router around a shared state.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .merge(handlers::sync::sync_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "campus-sync-backend is running"
}

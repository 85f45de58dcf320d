//! HTTP handlers for the sync control plane.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::handlers::auth::{AdminUser, ReadUser};
use crate::jobs::engine::RunTrigger;
use crate::models::error::ControlError;
use crate::models::source::{SourceKey, SyncMode};
use crate::models::sync::{
    ActionsQuery, ActionsResponse, ListStatusResponse, ProgressResponse, SetAutoRequest,
    SetAutoResponse, StopResponse, SyncStatusSummary, TriggerResponse,
};
use crate::services::{action_log, sync_config_store};
use crate::AppState;

const DEFAULT_ACTIONS_LIMIT: u64 = 50;
const MAX_ACTIONS_LIMIT: u64 = 200;

pub fn sync_router() -> Router<AppState> {
    Router::new()
        .route("/api/sync/status", get(list_status))
        .route("/api/sync/{source}/trigger", post(trigger_sync))
        .route("/api/sync/{source}/stop", post(stop_sync))
        .route("/api/sync/{source}/auto", put(set_auto))
        .route("/api/sync/{source}/progress", get(get_progress))
        .route("/api/sync/{source}/actions", get(list_actions))
}

fn parse_source(source: &str) -> Result<SourceKey, ControlError> {
    source
        .parse()
        .map_err(|_| ControlError::not_found(format!("unknown sync source: {}", source)))
}

fn db_err(e: sea_orm::DbErr) -> ControlError {
    ControlError::internal(format!("database error: {}", e))
}

/// POST /api/sync/{source}/trigger
///
/// Interval sources run a detached one-shot pass. Continuous sources pause
/// their loop, run one pass, and resume when auto is enabled. Either way
/// the response carries the sync id to poll progress with.
pub async fn trigger_sync(
    State(state): State<AppState>,
    Path(source): Path<String>,
    admin: AdminUser,
) -> Result<Json<TriggerResponse>, ControlError> {
    let key = parse_source(&source)?;
    tracing::info!("Manual sync trigger for {} by {}", key, admin.actor);

    let started = match key.mode() {
        SyncMode::Interval => {
            state
                .engine
                .run_once(key, &admin.actor, RunTrigger::Manual, &admin.meta)
                .await?
        }
        SyncMode::Continuous => {
            state
                .engine
                .manual_continuous_pass(key, &admin.actor, &admin.meta)
                .await?
        }
    };
    // the pass itself runs detached
    drop(started.handle);

    Ok(Json(TriggerResponse {
        source_key: key.as_str().to_string(),
        sync_id: started.sync_id,
        message: "sync started".to_string(),
    }))
}

/// POST /api/sync/{source}/stop
pub async fn stop_sync(
    State(state): State<AppState>,
    Path(source): Path<String>,
    admin: AdminUser,
) -> Result<Json<StopResponse>, ControlError> {
    let key = parse_source(&source)?;
    tracing::info!("Manual sync stop for {} by {}", key, admin.actor);

    state.engine.stop_source(key, &admin.actor, &admin.meta).await?;
    Ok(Json(StopResponse {
        source_key: key.as_str().to_string(),
        message: "stop requested".to_string(),
    }))
}

/// PUT /api/sync/{source}/auto
pub async fn set_auto(
    State(state): State<AppState>,
    Path(source): Path<String>,
    admin: AdminUser,
    Json(req): Json<SetAutoRequest>,
) -> Result<Json<SetAutoResponse>, ControlError> {
    let key = parse_source(&source)?;
    req.validate().map_err(ControlError::config_invalid)?;

    state
        .engine
        .set_auto_and_apply(key, req.enabled, req.interval_minutes, &admin.actor, &admin.meta)
        .await?;

    let row = sync_config_store::find_by_key(&state.db, key)
        .await
        .map_err(db_err)?
        .ok_or_else(|| ControlError::not_found(format!("no sync config for {}", key)))?;
    Ok(Json(SetAutoResponse {
        source_key: key.as_str().to_string(),
        auto_enabled: row.auto_enabled,
        interval_minutes: row.interval_minutes,
        message: "configuration updated".to_string(),
    }))
}

/// GET /api/sync/status
pub async fn list_status(
    State(state): State<AppState>,
    _user: ReadUser,
) -> Result<Json<ListStatusResponse>, ControlError> {
    let rows = sync_config_store::list_all(&state.db).await.map_err(db_err)?;
    Ok(Json(ListStatusResponse {
        sources: rows.into_iter().map(SyncStatusSummary::from).collect(),
    }))
}

/// GET /api/sync/{source}/progress
///
/// `progress: null` means no run is live and any previous record has been
/// purged; the durable outcome is in the status listing.
pub async fn get_progress(
    State(state): State<AppState>,
    Path(source): Path<String>,
    _user: ReadUser,
) -> Result<Json<ProgressResponse>, ControlError> {
    let key = parse_source(&source)?;
    let row = sync_config_store::find_by_key(&state.db, key)
        .await
        .map_err(db_err)?
        .ok_or_else(|| ControlError::not_found(format!("no sync config for {}", key)))?;
    Ok(Json(ProgressResponse {
        source_key: key.as_str().to_string(),
        progress: state.engine.progress().get(row.id),
    }))
}

/// GET /api/sync/{source}/actions
pub async fn list_actions(
    State(state): State<AppState>,
    Path(source): Path<String>,
    Query(query): Query<ActionsQuery>,
    _user: ReadUser,
) -> Result<Json<ActionsResponse>, ControlError> {
    let key = parse_source(&source)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ACTIONS_LIMIT)
        .min(MAX_ACTIONS_LIMIT);
    let entries = action_log::recent_for_target(&state.db, key.as_str(), limit)
        .await
        .map_err(db_err)?;
    Ok(Json(ActionsResponse {
        source_key: key.as_str().to_string(),
        actions: entries.into_iter().map(Into::into).collect(),
    }))
}

//! Action Log
//!
//! Append-only audit record of every control-plane action and every
//! auto-run outcome. Writes are best-effort from the engine's point of
//! view: a failed audit insert is logged and never aborts a sync.

use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set};

use chrono::Utc;

use crate::entities::action_log;
use crate::entities::prelude::ActionLog;

/// Action kinds written by the orchestrator.
pub mod actions {
    pub const AUTO_SYNC_STARTED: &str = "auto_sync_started";
    pub const AUTO_SYNC_COMPLETED: &str = "auto_sync_completed";
    pub const AUTO_SYNC_FAILED: &str = "auto_sync_failed";
    pub const AUTO_SYNC_STOPPED: &str = "auto_sync_stopped";
    pub const MANUAL_SYNC_STARTED: &str = "manual_sync_started";
    pub const MANUAL_SYNC_COMPLETED: &str = "manual_sync_completed";
    pub const MANUAL_SYNC_FAILED: &str = "manual_sync_failed";
    pub const MANUAL_SYNC_STOPPED: &str = "manual_sync_stopped";
    pub const MANUAL_STOP: &str = "manual_stop";
    pub const CONFIG_UPDATED: &str = "config_updated";
}

/// Target kind for sync sources.
pub const TARGET_SYNC_SOURCE: &str = "sync_source";

/// Request context attached to operator-initiated entries. Empty for
/// machine-initiated runs.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub path: Option<String>,
    pub method: Option<String>,
}

pub async fn append(
    db: &DatabaseConnection,
    actor_id: &str,
    action_kind: &str,
    target_id: &str,
    details: Option<serde_json::Value>,
    meta: &RequestMeta,
) -> Result<(), DbErr> {
    let entry = action_log::ActiveModel {
        actor_id: Set(actor_id.to_string()),
        action_kind: Set(action_kind.to_string()),
        target_kind: Set(TARGET_SYNC_SOURCE.to_string()),
        target_id: Set(target_id.to_string()),
        ip_address: Set(meta.ip_address.clone()),
        user_agent: Set(meta.user_agent.clone()),
        path: Set(meta.path.clone()),
        method: Set(meta.method.clone()),
        details_json: Set(details.map(|d| d.to_string())),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };
    entry.insert(db).await?;
    Ok(())
}

/// Most recent entries for one target, newest first.
pub async fn recent_for_target(
    db: &DatabaseConnection,
    target_id: &str,
    limit: u64,
) -> Result<Vec<action_log::Model>, DbErr> {
    ActionLog::find()
        .filter(action_log::Column::TargetId.eq(target_id))
        .order_by_desc(action_log::Column::CreatedAt)
        .order_by_desc(action_log::Column::Id)
        .limit(limit)
        .all(db)
        .await
}

//! Request/response bodies for the sync control plane.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::entities::{action_log, sync_config};
use crate::services::progress::ProgressSnapshot;

/// Summary of one sync_config row, as listed by the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatusSummary {
    pub source_key: String,
    pub mode: String,
    pub auto_enabled: bool,
    pub interval_minutes: i32,
    pub status: String,
    pub last_run_started_at: Option<NaiveDateTime>,
    pub last_run_ended_at: Option<NaiveDateTime>,
    pub last_run_duration_seconds: Option<i64>,
    pub last_records_synced: Option<i64>,
    pub last_error: Option<String>,
    pub next_run_at: Option<NaiveDateTime>,
    pub last_triggered_by: Option<String>,
}

impl From<sync_config::Model> for SyncStatusSummary {
    fn from(m: sync_config::Model) -> Self {
        Self {
            source_key: m.source_key,
            mode: m.mode,
            auto_enabled: m.auto_enabled,
            interval_minutes: m.interval_minutes,
            status: m.status,
            last_run_started_at: m.last_run_started_at,
            last_run_ended_at: m.last_run_ended_at,
            last_run_duration_seconds: m.last_run_duration_seconds,
            last_records_synced: m.last_records_synced,
            last_error: m.last_error,
            next_run_at: m.next_run_at,
            last_triggered_by: m.last_triggered_by,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListStatusResponse {
    pub sources: Vec<SyncStatusSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub source_key: String,
    pub sync_id: i32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopResponse {
    pub source_key: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAutoRequest {
    pub enabled: bool,
    pub interval_minutes: Option<i32>,
}

impl SetAutoRequest {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(minutes) = self.interval_minutes {
            if minutes <= 0 {
                return Err("interval_minutes must be a positive integer".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAutoResponse {
    pub source_key: String,
    pub auto_enabled: bool,
    pub interval_minutes: i32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub source_key: String,
    pub progress: Option<ProgressSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLogItem {
    pub actor_id: String,
    pub action_kind: String,
    pub target_kind: String,
    pub target_id: String,
    pub details_json: Option<String>,
    pub created_at: NaiveDateTime,
}

impl From<action_log::Model> for ActionLogItem {
    fn from(m: action_log::Model) -> Self {
        Self {
            actor_id: m.actor_id,
            action_kind: m.action_kind,
            target_kind: m.target_kind,
            target_id: m.target_id,
            details_json: m.details_json,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionsQuery {
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionsResponse {
    pub source_key: String,
    pub actions: Vec<ActionLogItem>,
}

//! `SeaORM` Entity for the sync_config table
//!
//! One row per upstream source; holds the lifecycle knobs and the outcome
//! of the most recent run.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_config")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub source_key: String,
    pub mode: String,
    pub auto_enabled: bool,
    pub interval_minutes: i32,
    pub status: String,
    pub last_run_started_at: Option<DateTime>,
    pub last_run_ended_at: Option<DateTime>,
    pub last_run_duration_seconds: Option<i64>,
    pub last_records_synced: Option<i64>,
    pub last_error: Option<String>,
    pub next_run_at: Option<DateTime>,
    pub last_triggered_by: Option<String>,
    pub updated_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

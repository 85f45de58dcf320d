//! `SeaORM` Entity for the lms_activity table
//!
//! Per-zone telemetry rows replaced wholesale on every LMS iteration.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "lms_activity")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub zone: String,
    pub student_no: String,
    pub course_code: String,
    pub activity_count: i64,
    pub last_seen_at: Option<DateTime>,
    pub synced_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! Sync-Config Store
//!
//! Durable source-of-truth for per-source lifecycle state. Every write
//! touches only the columns that belong to its cause, so an engine
//! transition and a concurrent operator edit never clobber each other.
//! The RUNNING guard is a single conditional UPDATE checked by its row
//! count.

use chrono::{NaiveDateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::entities::prelude::SyncConfig;
use crate::entities::sync_config;
use crate::models::source::{SourceKey, SyncMode};
use crate::models::status::SyncStatus;

const DEFAULT_INTERVAL_MINUTES: i32 = 60;

/// Short error strings stored in last_error are capped at this length.
const MAX_ERROR_LEN: usize = 500;

/// Terminal bookkeeping for one finished pass.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: SyncStatus,
    pub records: Option<i64>,
    pub error: Option<String>,
    pub duration_seconds: i64,
    pub next_run_at: Option<NaiveDateTime>,
}

/// Seed one row per known source. Existing rows are left untouched.
pub async fn ensure_defaults(db: &DatabaseConnection) -> Result<(), DbErr> {
    for key in SourceKey::ALL {
        let existing = SyncConfig::find()
            .filter(sync_config::Column::SourceKey.eq(key.as_str()))
            .one(db)
            .await?;
        if existing.is_none() {
            let row = sync_config::ActiveModel {
                source_key: Set(key.as_str().to_string()),
                mode: Set(key.mode().as_str().to_string()),
                auto_enabled: Set(false),
                interval_minutes: Set(DEFAULT_INTERVAL_MINUTES),
                status: Set(SyncStatus::Idle.as_str().to_string()),
                updated_at: Set(Some(Utc::now().naive_utc())),
                ..Default::default()
            };
            row.insert(db).await?;
            tracing::info!("Seeded sync_config row for {}", key);
        }
    }
    Ok(())
}

pub async fn find_by_key(
    db: &DatabaseConnection,
    key: SourceKey,
) -> Result<Option<sync_config::Model>, DbErr> {
    SyncConfig::find()
        .filter(sync_config::Column::SourceKey.eq(key.as_str()))
        .one(db)
        .await
}

pub async fn list_all(db: &DatabaseConnection) -> Result<Vec<sync_config::Model>, DbErr> {
    SyncConfig::find()
        .order_by_asc(sync_config::Column::SourceKey)
        .all(db)
        .await
}

/// Atomically claim the row for a new run. Returns false when another run
/// already holds status RUNNING; this is the sole guard against
/// double-starts.
pub async fn try_mark_running(
    db: &DatabaseConnection,
    key: SourceKey,
    actor: &str,
) -> Result<bool, DbErr> {
    let now = Utc::now().naive_utc();
    let result = SyncConfig::update_many()
        .col_expr(
            sync_config::Column::Status,
            Expr::value(SyncStatus::Running.as_str()),
        )
        .col_expr(sync_config::Column::LastRunStartedAt, Expr::value(now))
        .col_expr(
            sync_config::Column::LastTriggeredBy,
            Expr::value(actor.to_string()),
        )
        .col_expr(
            sync_config::Column::LastError,
            Expr::value(Option::<String>::None),
        )
        .col_expr(sync_config::Column::UpdatedAt, Expr::value(now))
        .filter(sync_config::Column::SourceKey.eq(key.as_str()))
        .filter(sync_config::Column::Status.ne(SyncStatus::Running.as_str()))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Record the terminal state of a pass. Only run-result columns are
/// written; operator-owned fields (auto_enabled, interval) are untouched.
pub async fn finish_run(
    db: &DatabaseConnection,
    key: SourceKey,
    outcome: RunOutcome,
) -> Result<(), DbErr> {
    let now = Utc::now().naive_utc();
    let error = outcome.error.map(|e| truncate(&e, MAX_ERROR_LEN));
    let mut update = SyncConfig::update_many()
        .col_expr(
            sync_config::Column::Status,
            Expr::value(outcome.status.as_str()),
        )
        .col_expr(sync_config::Column::LastRunEndedAt, Expr::value(now))
        .col_expr(
            sync_config::Column::LastRunDurationSeconds,
            Expr::value(outcome.duration_seconds),
        )
        .col_expr(sync_config::Column::LastError, Expr::value(error))
        .col_expr(
            sync_config::Column::NextRunAt,
            Expr::value(outcome.next_run_at),
        )
        .col_expr(sync_config::Column::UpdatedAt, Expr::value(now));
    if let Some(records) = outcome.records {
        update = update.col_expr(
            sync_config::Column::LastRecordsSynced,
            Expr::value(records),
        );
    }
    update
        .filter(sync_config::Column::SourceKey.eq(key.as_str()))
        .exec(db)
        .await?;
    Ok(())
}

/// Per-iteration bookkeeping for a continuous source; status stays RUNNING.
pub async fn heartbeat_continuous(
    db: &DatabaseConnection,
    key: SourceKey,
    records: i64,
) -> Result<(), DbErr> {
    let now = Utc::now().naive_utc();
    SyncConfig::update_many()
        .col_expr(sync_config::Column::LastRunEndedAt, Expr::value(now))
        .col_expr(sync_config::Column::LastRecordsSynced, Expr::value(records))
        .col_expr(sync_config::Column::UpdatedAt, Expr::value(now))
        .filter(sync_config::Column::SourceKey.eq(key.as_str()))
        .exec(db)
        .await?;
    Ok(())
}

/// Sticky stop: status STOPPED and no scheduled next run.
pub async fn mark_stopped(db: &DatabaseConnection, key: SourceKey) -> Result<(), DbErr> {
    let now = Utc::now().naive_utc();
    SyncConfig::update_many()
        .col_expr(
            sync_config::Column::Status,
            Expr::value(SyncStatus::Stopped.as_str()),
        )
        .col_expr(
            sync_config::Column::NextRunAt,
            Expr::value(Option::<NaiveDateTime>::None),
        )
        .col_expr(sync_config::Column::UpdatedAt, Expr::value(now))
        .filter(sync_config::Column::SourceKey.eq(key.as_str()))
        .exec(db)
        .await?;
    Ok(())
}

/// Clear next_run_at; used when a continuous loop takes over a source.
pub async fn clear_next_run(db: &DatabaseConnection, key: SourceKey) -> Result<(), DbErr> {
    SyncConfig::update_many()
        .col_expr(
            sync_config::Column::NextRunAt,
            Expr::value(Option::<NaiveDateTime>::None),
        )
        .filter(sync_config::Column::SourceKey.eq(key.as_str()))
        .exec(db)
        .await?;
    Ok(())
}

/// Operator edit of the auto-run knobs. Touches nothing else.
pub async fn set_auto(
    db: &DatabaseConnection,
    key: SourceKey,
    enabled: bool,
    interval_minutes: Option<i32>,
) -> Result<(), DbErr> {
    let now = Utc::now().naive_utc();
    let mut update = SyncConfig::update_many()
        .col_expr(sync_config::Column::AutoEnabled, Expr::value(enabled))
        .col_expr(sync_config::Column::UpdatedAt, Expr::value(now));
    if let Some(minutes) = interval_minutes {
        update = update.col_expr(sync_config::Column::IntervalMinutes, Expr::value(minutes));
    }
    update
        .filter(sync_config::Column::SourceKey.eq(key.as_str()))
        .exec(db)
        .await?;
    Ok(())
}

/// Hand a RUNNING claim back without the sticky stop. The row returns to
/// IDLE, so the scheduler and manual passes can claim it again; used when a
/// loop is paused on the operator's behalf rather than stopped by them.
pub async fn release_running(db: &DatabaseConnection, key: SourceKey) -> Result<(), DbErr> {
    SyncConfig::update_many()
        .col_expr(
            sync_config::Column::Status,
            Expr::value(SyncStatus::Idle.as_str()),
        )
        .col_expr(
            sync_config::Column::UpdatedAt,
            Expr::value(Utc::now().naive_utc()),
        )
        .filter(sync_config::Column::SourceKey.eq(key.as_str()))
        .filter(sync_config::Column::Status.eq(SyncStatus::Running.as_str()))
        .exec(db)
        .await?;
    Ok(())
}

/// Re-enabling auto lifts a sticky stop; the row returns to IDLE.
pub async fn clear_stopped(db: &DatabaseConnection, key: SourceKey) -> Result<bool, DbErr> {
    let result = SyncConfig::update_many()
        .col_expr(
            sync_config::Column::Status,
            Expr::value(SyncStatus::Idle.as_str()),
        )
        .col_expr(
            sync_config::Column::UpdatedAt,
            Expr::value(Utc::now().naive_utc()),
        )
        .filter(sync_config::Column::SourceKey.eq(key.as_str()))
        .filter(sync_config::Column::Status.eq(SyncStatus::Stopped.as_str()))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Crash recovery at boot: a row left RUNNING has no live worker, so the
/// interrupted run counts as failed. STOPPED rows keep their sticky state.
pub async fn recover_interrupted(db: &DatabaseConnection) -> Result<u64, DbErr> {
    let now = Utc::now().naive_utc();
    let result = SyncConfig::update_many()
        .col_expr(
            sync_config::Column::Status,
            Expr::value(SyncStatus::Failed.as_str()),
        )
        .col_expr(
            sync_config::Column::LastError,
            Expr::value(Some("interrupted by restart".to_string())),
        )
        .col_expr(sync_config::Column::LastRunEndedAt, Expr::value(now))
        .col_expr(sync_config::Column::UpdatedAt, Expr::value(now))
        .filter(sync_config::Column::Status.eq(SyncStatus::Running.as_str()))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// INTERVAL sources the scheduler should start now: auto-enabled, neither
/// running nor sticky-stopped, and due (or never scheduled).
pub async fn due_interval_sources(
    db: &DatabaseConnection,
    now: NaiveDateTime,
) -> Result<Vec<sync_config::Model>, DbErr> {
    SyncConfig::find()
        .filter(sync_config::Column::Mode.eq(SyncMode::Interval.as_str()))
        .filter(sync_config::Column::AutoEnabled.eq(true))
        .filter(
            sync_config::Column::Status
                .is_not_in([SyncStatus::Running.as_str(), SyncStatus::Stopped.as_str()]),
        )
        .filter(
            Condition::any()
                .add(sync_config::Column::NextRunAt.is_null())
                .add(sync_config::Column::NextRunAt.lte(now)),
        )
        .all(db)
        .await
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s[..end].to_string()
    }
}

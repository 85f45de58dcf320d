//! LMS telemetry adapter (continuous mode)
//!
//! One call is one iteration: fetch activity for every configured zone and
//! replace that zone's rows in the local store. Zones fail independently;
//! an iteration only fails when every zone did.

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::entities::lms_activity;
use crate::entities::prelude::LmsActivity;
use crate::jobs::adapters::{AdapterContext, AdapterError, SourceAdapter};
use crate::models::source::SourceKey;
use crate::models::status::LogLevel;

/// Base URL of the LMS telemetry API.
pub const ENV_LMS_API_BASE: &str = "LMS_API_BASE";

/// Comma-separated zone identifiers.
pub const ENV_LMS_ZONES: &str = "LMS_ZONES";

const DEFAULT_ZONES: &str = "main";

const HTTP_TIMEOUT_SECS: u64 = 30;

/// One activity row as served by the LMS zone endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ZoneActivityRow {
    pub student_no: String,
    pub course_code: String,
    #[serde(default)]
    pub activity_count: i64,
    pub last_seen_at: Option<NaiveDateTime>,
}

pub struct LmsAdapter {
    http: reqwest::Client,
}

impl LmsAdapter {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { http }
    }

    async fn fetch_zone(&self, base: &str, zone: &str) -> Result<Vec<ZoneActivityRow>, String> {
        let url = format!("{}/zones/{}/activity", base.trim_end_matches('/'), zone);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?
            .error_for_status()
            .map_err(|e| format!("bad status: {}", e))?;
        response
            .json::<Vec<ZoneActivityRow>>()
            .await
            .map_err(|e| format!("invalid body: {}", e))
    }
}

impl Default for LmsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace all rows of one zone with the freshly fetched set.
pub async fn store_zone(
    db: &DatabaseConnection,
    zone: &str,
    rows: &[ZoneActivityRow],
) -> Result<i64, sea_orm::DbErr> {
    let now = Utc::now().naive_utc();
    LmsActivity::delete_many()
        .filter(lms_activity::Column::Zone.eq(zone))
        .exec(db)
        .await?;
    if rows.is_empty() {
        return Ok(0);
    }
    let models: Vec<lms_activity::ActiveModel> = rows
        .iter()
        .map(|r| lms_activity::ActiveModel {
            zone: Set(zone.to_string()),
            student_no: Set(r.student_no.clone()),
            course_code: Set(r.course_code.clone()),
            activity_count: Set(r.activity_count),
            last_seen_at: Set(r.last_seen_at),
            synced_at: Set(Some(now)),
            ..Default::default()
        })
        .collect();
    LmsActivity::insert_many(models).exec(db).await?;
    Ok(rows.len() as i64)
}

fn configured_zones() -> Vec<String> {
    env::var(ENV_LMS_ZONES)
        .unwrap_or_else(|_| DEFAULT_ZONES.to_string())
        .split(',')
        .map(|z| z.trim().to_string())
        .filter(|z| !z.is_empty())
        .collect()
}

#[async_trait]
impl SourceAdapter for LmsAdapter {
    fn key(&self) -> SourceKey {
        SourceKey::Lms
    }

    async fn run(&self, ctx: AdapterContext) -> Result<Option<i64>, AdapterError> {
        let base = env::var(ENV_LMS_API_BASE)
            .map_err(|_| AdapterError::failed(format!("{} is not configured", ENV_LMS_API_BASE)))?;
        let zones = configured_zones();
        if zones.is_empty() {
            return Ok(Some(0));
        }

        let mut total: i64 = 0;
        let mut failed_zones = 0usize;

        for (i, zone) in zones.iter().enumerate() {
            if ctx.stop.is_triggered() {
                return Err(AdapterError::Stopped);
            }
            match self.fetch_zone(&base, zone).await {
                Ok(rows) => match store_zone(&ctx.db, zone, &rows).await {
                    Ok(n) => {
                        total += n;
                        ctx.emitter
                            .log(LogLevel::Info, format!("Stored {} records for zone {}", n, zone));
                    }
                    Err(e) => {
                        failed_zones += 1;
                        tracing::warn!("Failed to store LMS zone {}: {}", zone, e);
                        ctx.emitter
                            .log(LogLevel::Info, format!("zone {} failed: {}", zone, e));
                    }
                },
                Err(e) => {
                    failed_zones += 1;
                    tracing::warn!("Failed to fetch LMS zone {}: {}", zone, e);
                    ctx.emitter
                        .log(LogLevel::Info, format!("zone {} failed: {}", zone, e));
                }
            }
            let percent = (5 + (i + 1) * 90 / zones.len()) as u8;
            ctx.emitter
                .update(percent, &format!("zone {}/{}", i + 1, zones.len()), total);
        }

        if failed_zones == zones.len() {
            return Err(AdapterError::failed("all zones failed"));
        }
        Ok(Some(total))
    }
}

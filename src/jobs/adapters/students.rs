//! Student registry adapter (interval mode)
//!
//! Drives the external student fetch script, which reports per-campus
//! progress ("Fetching for Pardis ... Term ...") and per-campus counts
//! that accumulate into the pass total.

use async_trait::async_trait;

use crate::jobs::adapters::process::run_fetch_process;
use crate::jobs::adapters::{AdapterContext, AdapterError, SourceAdapter};
use crate::models::source::SourceKey;
use crate::models::status::LogLevel;

/// Command line of the student fetch script.
pub const ENV_STUDENTS_CMD: &str = "SYNC_STUDENTS_CMD";

pub struct StudentsAdapter;

#[async_trait]
impl SourceAdapter for StudentsAdapter {
    fn key(&self) -> SourceKey {
        SourceKey::Students
    }

    async fn run(&self, ctx: AdapterContext) -> Result<Option<i64>, AdapterError> {
        ctx.emitter
            .log(LogLevel::Info, "Starting student registry fetch");
        run_fetch_process(ENV_STUDENTS_CMD, &ctx).await
    }
}

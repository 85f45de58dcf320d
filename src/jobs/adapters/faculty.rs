//! Faculty registry adapter (interval mode)
//!
//! Delegates to the external faculty fetch script and watches its output
//! for the final inserted/updated count.

use async_trait::async_trait;

use crate::jobs::adapters::process::run_fetch_process;
use crate::jobs::adapters::{AdapterContext, AdapterError, SourceAdapter};
use crate::models::source::SourceKey;
use crate::models::status::LogLevel;

/// Command line of the faculty fetch script.
pub const ENV_FACULTY_CMD: &str = "SYNC_FACULTY_CMD";

pub struct FacultyAdapter;

#[async_trait]
impl SourceAdapter for FacultyAdapter {
    fn key(&self) -> SourceKey {
        SourceKey::Faculty
    }

    async fn run(&self, ctx: AdapterContext) -> Result<Option<i64>, AdapterError> {
        ctx.emitter
            .log(LogLevel::Info, "Starting faculty registry fetch");
        run_fetch_process(ENV_FACULTY_CMD, &ctx).await
    }
}

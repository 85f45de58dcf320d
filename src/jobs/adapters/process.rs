//! Subprocess runner for interval-mode fetch scripts
//!
//! Spawns the configured fetch command, streams its stdout line by line
//! through the marker parser, and forwards log entries and counts to the
//! progress registry as they appear. The child is killed when the pass's
//! stop signal fires; `kill_on_drop` covers the watchdog path, where the
//! engine aborts the whole worker.

use std::env;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::jobs::adapters::output::OutputParser;
use crate::jobs::adapters::{AdapterContext, AdapterError};
use crate::models::status::LogLevel;

/// Percent shown once the process has started.
const PERCENT_STARTED: u8 = 5;

/// Ceiling while the process is still running; 100 is the engine's call.
const PERCENT_CEILING: u8 = 90;

/// Per-phase percent step.
const PERCENT_PER_PHASE: u8 = 5;

pub(crate) async fn run_fetch_process(
    cmd_env: &str,
    ctx: &AdapterContext,
) -> Result<Option<i64>, AdapterError> {
    let raw = env::var(cmd_env)
        .map_err(|_| AdapterError::failed(format!("{} is not configured", cmd_env)))?;
    let mut parts = raw.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| AdapterError::failed(format!("{} is empty", cmd_env)))?;

    let mut child = Command::new(program)
        .args(parts)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| AdapterError::failed(format!("failed to spawn fetch process: {}", e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AdapterError::failed("fetch process has no stdout"))?;
    let mut lines = BufReader::new(stdout).lines();

    let mut parser = OutputParser::new();
    let mut percent = PERCENT_STARTED;
    let mut records: i64 = 0;
    ctx.emitter.update(percent, "fetching", records);

    loop {
        tokio::select! {
            _ = ctx.stop.triggered() => {
                tracing::info!("Stop requested, killing fetch process ({})", cmd_env);
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(AdapterError::Stopped);
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let outcome = parser.feed(&line);
                        if let Some((level, message)) = outcome.log {
                            ctx.emitter.log(level, message);
                        }
                        if let Some(total) = outcome.records_total {
                            records = total;
                            ctx.emitter.records(records);
                        }
                        if let Some(phase) = outcome.phase {
                            percent = percent
                                .saturating_add(PERCENT_PER_PHASE)
                                .min(PERCENT_CEILING);
                            ctx.emitter.update(percent, &phase, records);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("Error reading fetch process output: {}", e);
                        break;
                    }
                }
            }
        }
    }

    let status = child
        .wait()
        .await
        .map_err(|e| AdapterError::failed(format!("failed to reap fetch process: {}", e)))?;

    if !status.success() {
        ctx.emitter
            .log(LogLevel::Error, format!("fetch process exited with {}", status));
        return Err(AdapterError::failed(format!(
            "fetch process exited with {}",
            status
        )));
    }

    Ok(parser.final_records())
}

//! Continuous-Sync Supervisor
//!
//! Owns the long-lived loop of a continuous source: one adapter iteration,
//! a heartbeat into the Sync-Config Store, then a sleep until the next
//! fetch. Failed iterations back off and retry; the loop only ends when its
//! stop signal fires. The source's row stays RUNNING for the lifetime of
//! the loop, which is what makes the double-start guard cover continuous
//! sources too.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use crate::jobs::adapters::{AdapterContext, AdapterError, StopSignal};
use crate::jobs::engine::{RunStarted, RunTrigger, SyncEngine};
use crate::models::error::{ControlError, ErrorKind};
use crate::models::source::{SourceKey, SyncMode};
use crate::models::status::{LogLevel, ProgressStatus, SyncStatus};
use crate::services::action_log::{self, actions, RequestMeta};
use crate::services::config::SYSTEM_ACTOR;
use crate::services::progress::ProgressEmitter;
use crate::services::sync_config_store;

/// A live continuous loop: its cancellation flag and the task to join.
pub(crate) struct SupervisorHandle {
    pub(crate) stop: StopSignal,
    pub(crate) handle: JoinHandle<()>,
}

impl SyncEngine {
    /// Start the continuous loop for a source. Claims the row exactly like
    /// a one-shot pass; the claim is released when the loop is stopped.
    pub async fn start_continuous(
        &self,
        key: SourceKey,
        actor: &str,
        trigger: RunTrigger,
        meta: &RequestMeta,
    ) -> Result<i32, ControlError> {
        if key.mode() != SyncMode::Continuous {
            return Err(ControlError::config_invalid(format!(
                "{} is not a continuous source",
                key
            )));
        }
        if self.supervisor_alive(key) {
            return Err(ControlError::already_running(key.as_str()));
        }

        let row = sync_config_store::find_by_key(self.db(), key)
            .await
            .map_err(|e| ControlError::internal(format!("database error: {}", e)))?
            .ok_or_else(|| ControlError::not_found(format!("no sync config for {}", key)))?;

        let claimed = sync_config_store::try_mark_running(self.db(), key, actor)
            .await
            .map_err(|e| ControlError::internal(format!("database error: {}", e)))?;
        if !claimed {
            return Err(ControlError::already_running(key.as_str()));
        }

        // A continuous source has no schedule slot while its loop runs.
        if let Err(e) = sync_config_store::clear_next_run(self.db(), key).await {
            tracing::warn!("Failed to clear next_run_at for {}: {}", key, e);
        }

        if let Err(e) = action_log::append(
            self.db(),
            actor,
            trigger.started_kind(),
            key.as_str(),
            None,
            meta,
        )
        .await
        {
            tracing::warn!("Failed to write action log entry: {}", e);
        }

        let sync_id = row.id;
        self.progress().begin(sync_id);

        let stop = StopSignal::new();
        let engine = self.clone();
        let actor = actor.to_string();
        let loop_stop = stop.clone();
        let handle = tokio::spawn(async move {
            continuous_loop(engine, key, sync_id, actor, loop_stop).await;
        });
        self.inner
            .supervisors
            .lock()
            .insert(key, SupervisorHandle { stop, handle });

        tracing::info!("Continuous sync loop started for {}", key);
        Ok(sync_id)
    }

    /// Stop the continuous loop and record the sticky STOPPED state. A
    /// worker that refuses to wind down within the join window is aborted
    /// and reported as a timeout.
    pub async fn stop_continuous(
        &self,
        key: SourceKey,
        actor: &str,
        meta: &RequestMeta,
    ) -> Result<(), ControlError> {
        let forced = self
            .halt_supervisor(key)
            .await
            .ok_or_else(|| ControlError::not_running(key.as_str()))?;

        sync_config_store::mark_stopped(self.db(), key)
            .await
            .map_err(|e| ControlError::internal(format!("database error: {}", e)))?;

        if let Err(e) = action_log::append(
            self.db(),
            actor,
            actions::MANUAL_STOP,
            key.as_str(),
            Some(serde_json::json!({ "forced": forced })),
            meta,
        )
        .await
        {
            tracing::warn!("Failed to write action log entry: {}", e);
        }

        if forced {
            return Err(ControlError::new(
                ErrorKind::Timeout,
                format!("{} worker did not wind down in time and was aborted", key),
            ));
        }
        Ok(())
    }

    /// Stop whatever is currently running for a source: the continuous loop
    /// for continuous sources, the in-flight pass for interval ones. A
    /// manual one-shot pass of a continuous source is stoppable too.
    pub async fn stop_source(
        &self,
        key: SourceKey,
        actor: &str,
        meta: &RequestMeta,
    ) -> Result<(), ControlError> {
        match key.mode() {
            SyncMode::Continuous => match self.stop_continuous(key, actor, meta).await {
                Err(e) if e.kind == ErrorKind::NotRunning => {
                    self.stop_interval_pass(key)?;
                    self.audit_manual_stop(key, actor, meta).await;
                    Ok(())
                }
                other => other,
            },
            SyncMode::Interval => {
                self.stop_interval_pass(key)?;
                self.audit_manual_stop(key, actor, meta).await;
                Ok(())
            }
        }
    }

    /// Scheduler hook: revive the loop of an auto-enabled continuous source
    /// that is not currently supervised. Sticky STOPPED rows stay down.
    pub async fn ensure_running_if_enabled(&self, key: SourceKey) {
        if key.mode() != SyncMode::Continuous || self.supervisor_alive(key) {
            return;
        }
        let row = match sync_config_store::find_by_key(self.db(), key).await {
            Ok(Some(row)) => row,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("Failed to read sync config for {}: {}", key, e);
                return;
            }
        };
        if !row.auto_enabled || row.status == SyncStatus::Stopped.as_str() {
            return;
        }
        if let Err(e) = self
            .start_continuous(key, SYSTEM_ACTOR, RunTrigger::Auto, &RequestMeta::default())
            .await
        {
            if e.kind != ErrorKind::AlreadyRunning {
                tracing::warn!("Failed to revive continuous loop for {}: {}", key, e);
            }
        }
    }

    /// Manual one-shot pass of a continuous source: pause the loop, run a
    /// single awaitable pass, then resume the loop when auto is enabled.
    /// An operator stop issued while the pass runs is sticky; the loop is
    /// not resumed over it.
    pub async fn manual_continuous_pass(
        &self,
        key: SourceKey,
        actor: &str,
        meta: &RequestMeta,
    ) -> Result<RunStarted, ControlError> {
        if key.mode() != SyncMode::Continuous {
            return Err(ControlError::config_invalid(format!(
                "{} is not a continuous source",
                key
            )));
        }

        let was_running = self.halt_supervisor(key).await.is_some();
        if was_running {
            // hand the loop's claim back as IDLE, not STOPPED: the pause is
            // on the operator's behalf, they did not ask for a lasting stop
            sync_config_store::release_running(self.db(), key)
                .await
                .map_err(|e| ControlError::internal(format!("database error: {}", e)))?;
            self.audit_manual_stop(key, actor, meta).await;
        }

        let started = match self.run_once(key, actor, RunTrigger::Manual, meta).await {
            Ok(started) => started,
            Err(e) => {
                // the loop must not stay down because the pass never started
                if was_running {
                    self.ensure_running_if_enabled(key).await;
                }
                return Err(e);
            }
        };
        let sync_id = started.sync_id;
        let pass = started.handle;

        let engine = self.clone();
        let handle = tokio::spawn(async move {
            let _ = pass.await;
            // resumes only when auto is on and the row is not sticky
            // STOPPED; a stop issued while the pass ran wins
            engine.ensure_running_if_enabled(key).await;
        });

        Ok(RunStarted { sync_id, handle })
    }

    /// Persist an auto-run edit and apply its side effects: re-enabling
    /// lifts a sticky stop, and continuous sources start or stop their
    /// loop to match the flag.
    pub async fn set_auto_and_apply(
        &self,
        key: SourceKey,
        enabled: bool,
        interval_minutes: Option<i32>,
        actor: &str,
        meta: &RequestMeta,
    ) -> Result<(), ControlError> {
        sync_config_store::find_by_key(self.db(), key)
            .await
            .map_err(|e| ControlError::internal(format!("database error: {}", e)))?
            .ok_or_else(|| ControlError::not_found(format!("no sync config for {}", key)))?;

        sync_config_store::set_auto(self.db(), key, enabled, interval_minutes)
            .await
            .map_err(|e| ControlError::internal(format!("database error: {}", e)))?;
        if enabled {
            if let Err(e) = sync_config_store::clear_stopped(self.db(), key).await {
                tracing::warn!("Failed to lift sticky stop for {}: {}", key, e);
            }
        }

        if let Err(e) = action_log::append(
            self.db(),
            actor,
            actions::CONFIG_UPDATED,
            key.as_str(),
            Some(serde_json::json!({
                "auto_enabled": enabled,
                "interval_minutes": interval_minutes,
            })),
            meta,
        )
        .await
        {
            tracing::warn!("Failed to write action log entry: {}", e);
        }

        if key.mode() == SyncMode::Continuous {
            if enabled {
                self.ensure_running_if_enabled(key).await;
            } else if self.supervisor_alive(key) {
                let _ = self.halt_supervisor(key).await;
                sync_config_store::mark_stopped(self.db(), key)
                    .await
                    .map_err(|e| ControlError::internal(format!("database error: {}", e)))?;
            }
        }
        Ok(())
    }

    /// Is there a live supervisor task for this source? Finished entries
    /// are pruned on sight.
    fn supervisor_alive(&self, key: SourceKey) -> bool {
        let mut map = self.inner.supervisors.lock();
        match map.get(&key) {
            Some(h) if !h.handle.is_finished() => true,
            Some(_) => {
                map.remove(&key);
                false
            }
            None => false,
        }
    }

    /// Signal the loop and wait out the join window. Returns `None` when no
    /// loop was live, `Some(true)` when the task had to be aborted.
    async fn halt_supervisor(&self, key: SourceKey) -> Option<bool> {
        let entry = { self.inner.supervisors.lock().remove(&key) }?;
        entry.stop.trigger();
        let abort = entry.handle.abort_handle();
        let join_window = Duration::from_secs(self.config().stop_join_secs);
        match timeout(join_window, entry.handle).await {
            Ok(_) => Some(false),
            Err(_) => {
                abort.abort();
                Some(true)
            }
        }
    }

    async fn audit_manual_stop(&self, key: SourceKey, actor: &str, meta: &RequestMeta) {
        if let Err(e) = action_log::append(
            self.db(),
            actor,
            actions::MANUAL_STOP,
            key.as_str(),
            None,
            meta,
        )
        .await
        {
            tracing::warn!("Failed to write action log entry: {}", e);
        }
    }
}

async fn continuous_loop(
    engine: SyncEngine,
    key: SourceKey,
    sync_id: i32,
    actor: String,
    stop: StopSignal,
) {
    let fetch_interval = Duration::from_secs(engine.config().lms_fetch_interval_secs);
    let backoff = Duration::from_secs(engine.config().error_backoff_secs);
    let budget = engine.config().timeout_for(key);
    let emitter = ProgressEmitter::new(engine.progress().clone(), sync_id);

    let mut iteration: u64 = 0;
    let mut established = false;

    loop {
        if stop.is_triggered() {
            break;
        }
        let adapter = match engine.adapter(key) {
            Some(adapter) => adapter,
            None => {
                emitter.log(
                    LogLevel::Error,
                    format!("no adapter registered for {}", key),
                );
                break;
            }
        };
        let ctx = AdapterContext {
            db: engine.db().clone(),
            emitter: emitter.clone(),
            stop: stop.clone(),
            actor: actor.clone(),
        };
        let result = match timeout(budget, adapter.run(ctx)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(AdapterError::failed(format!(
                "iteration timed out after {}s",
                budget.as_secs()
            ))),
        };

        match result {
            Ok(records) => {
                iteration += 1;
                let records = records.unwrap_or(0);
                if let Err(e) =
                    sync_config_store::heartbeat_continuous(engine.db(), key, records).await
                {
                    tracing::warn!("Heartbeat write failed for {}: {}", key, e);
                }
                emitter.update(
                    50,
                    &format!("iteration {}: {} records", iteration, records),
                    records,
                );
                if !established {
                    emitter.log(LogLevel::Success, "Continuous sync established");
                    established = true;
                }
                tokio::select! {
                    _ = stop.triggered() => break,
                    _ = sleep(fetch_interval) => {}
                }
            }
            Err(AdapterError::Stopped) => break,
            Err(AdapterError::Failed(message)) => {
                tracing::warn!("Continuous iteration failed for {}: {}", key, message);
                emitter.log(LogLevel::Error, format!("Iteration failed: {}", message));
                tokio::select! {
                    _ = stop.triggered() => break,
                    _ = sleep(backoff) => {}
                }
            }
        }
    }

    emitter.log(LogLevel::Info, "Continuous sync loop exited");
    engine
        .progress()
        .mark_terminal(sync_id, ProgressStatus::CompletedContinuous);
    tracing::info!("Continuous sync loop for {} exited", key);
}

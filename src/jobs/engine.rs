//! Sync Engine
//!
//! Executes one sync pass of any adapter: claims the source row, wires the
//! adapter's events into the Progress Registry, enforces the per-source
//! watchdog, and records the terminal outcome in the Sync-Config Store and
//! the Action Log. The RUNNING claim is committed before the worker spawns,
//! so a concurrent scheduler tick can never double-schedule a source.

use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

use crate::entities::prelude::{FacultyMembers, LmsActivity, Students};
use crate::jobs::adapters::faculty::FacultyAdapter;
use crate::jobs::adapters::lms::LmsAdapter;
use crate::jobs::adapters::students::StudentsAdapter;
use crate::jobs::adapters::{AdapterContext, AdapterError, SourceAdapter, StopSignal};
use crate::jobs::supervisor::SupervisorHandle;
use crate::models::error::ControlError;
use crate::models::source::{SourceKey, SyncMode};
use crate::models::status::{LogLevel, ProgressStatus, SyncStatus};
use crate::services::action_log::{self, actions, RequestMeta};
use crate::services::config::OrchestratorConfig;
use crate::services::progress::{ProgressEmitter, ProgressRegistry};
use crate::services::sync_config_store::{self, RunOutcome};

/// Who asked for this pass; decides which audit kinds are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTrigger {
    Manual,
    Auto,
}

impl RunTrigger {
    pub(crate) fn started_kind(&self) -> &'static str {
        match self {
            RunTrigger::Manual => actions::MANUAL_SYNC_STARTED,
            RunTrigger::Auto => actions::AUTO_SYNC_STARTED,
        }
    }

    pub(crate) fn completed_kind(&self) -> &'static str {
        match self {
            RunTrigger::Manual => actions::MANUAL_SYNC_COMPLETED,
            RunTrigger::Auto => actions::AUTO_SYNC_COMPLETED,
        }
    }

    pub(crate) fn failed_kind(&self) -> &'static str {
        match self {
            RunTrigger::Manual => actions::MANUAL_SYNC_FAILED,
            RunTrigger::Auto => actions::AUTO_SYNC_FAILED,
        }
    }

    pub(crate) fn stopped_kind(&self) -> &'static str {
        match self {
            RunTrigger::Manual => actions::MANUAL_SYNC_STOPPED,
            RunTrigger::Auto => actions::AUTO_SYNC_STOPPED,
        }
    }
}

/// A pass that was accepted and spawned.
#[derive(Debug)]
pub struct RunStarted {
    pub sync_id: i32,
    pub handle: JoinHandle<()>,
}

enum PassResult {
    Success(Option<i64>),
    Failed(String),
    Stopped,
    Timeout,
}

pub(crate) struct EngineInner {
    pub(crate) db: DatabaseConnection,
    pub(crate) config: OrchestratorConfig,
    pub(crate) progress: ProgressRegistry,
    adapters: HashMap<SourceKey, Arc<dyn SourceAdapter>>,
    pub(crate) supervisors: Mutex<HashMap<SourceKey, SupervisorHandle>>,
    interval_stops: Mutex<HashMap<SourceKey, StopSignal>>,
    shutdown: StopSignal,
}

/// The long-lived orchestrator value. Cheap to clone; initialised once at
/// process start and passed by reference everywhere. No hidden globals.
#[derive(Clone)]
pub struct SyncEngine {
    pub(crate) inner: Arc<EngineInner>,
}

impl SyncEngine {
    pub fn new(
        db: DatabaseConnection,
        config: OrchestratorConfig,
        adapters: Vec<Arc<dyn SourceAdapter>>,
    ) -> Self {
        let progress = ProgressRegistry::new(config.progress_ring_size, config.progress_grace_secs);
        let adapters = adapters.into_iter().map(|a| (a.key(), a)).collect();
        Self {
            inner: Arc::new(EngineInner {
                db,
                config,
                progress,
                adapters,
                supervisors: Mutex::new(HashMap::new()),
                interval_stops: Mutex::new(HashMap::new()),
                shutdown: StopSignal::new(),
            }),
        }
    }

    /// Engine with the three production adapters registered.
    pub fn with_default_adapters(db: DatabaseConnection, config: OrchestratorConfig) -> Self {
        Self::new(
            db,
            config,
            vec![
                Arc::new(FacultyAdapter),
                Arc::new(StudentsAdapter),
                Arc::new(LmsAdapter::new()),
            ],
        )
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.inner.db
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    pub fn progress(&self) -> &ProgressRegistry {
        &self.inner.progress
    }

    pub(crate) fn adapter(&self, key: SourceKey) -> Option<Arc<dyn SourceAdapter>> {
        self.inner.adapters.get(&key).cloned()
    }

    /// Process-wide shutdown signal; flipping it stops the scheduler and
    /// every continuous supervisor.
    pub fn shutdown_signal(&self) -> StopSignal {
        self.inner.shutdown.clone()
    }

    /// Graceful shutdown: stop the scheduler and wind down every continuous
    /// loop. In-flight interval passes are left alone; their rows stay
    /// RUNNING and boot recovery settles them on the next start.
    pub async fn shutdown(&self) {
        self.inner.shutdown.trigger();
        let supervisors: Vec<SupervisorHandle> = {
            let mut map = self.inner.supervisors.lock();
            map.drain().map(|(_, handle)| handle).collect()
        };
        for sup in &supervisors {
            sup.stop.trigger();
        }
        let join_window = std::time::Duration::from_secs(self.inner.config.stop_join_secs);
        for sup in supervisors {
            let _ = tokio::time::timeout(join_window, sup.handle).await;
        }
    }

    /// Execute one pass of a source. Claims the row, spawns the worker and
    /// returns immediately; callers that need the result await the handle.
    pub async fn run_once(
        &self,
        key: SourceKey,
        actor: &str,
        trigger: RunTrigger,
        meta: &RequestMeta,
    ) -> Result<RunStarted, ControlError> {
        let row = sync_config_store::find_by_key(&self.inner.db, key)
            .await
            .map_err(|e| ControlError::internal(format!("database error: {}", e)))?
            .ok_or_else(|| ControlError::not_found(format!("no sync config for {}", key)))?;

        let claimed = sync_config_store::try_mark_running(&self.inner.db, key, actor)
            .await
            .map_err(|e| ControlError::internal(format!("database error: {}", e)))?;
        if !claimed {
            return Err(ControlError::already_running(key.as_str()));
        }

        if let Err(e) = action_log::append(
            &self.inner.db,
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
        self.inner.progress.begin(sync_id);

        let stop = StopSignal::new();
        self.inner.interval_stops.lock().insert(key, stop.clone());

        let engine = self.clone();
        let actor = actor.to_string();
        let meta = meta.clone();
        let handle = tokio::spawn(async move {
            engine
                .execute_pass(key, sync_id, &actor, trigger, stop, &meta)
                .await;
        });

        Ok(RunStarted { sync_id, handle })
    }

    /// Request cancellation of an in-flight interval pass. The pass is
    /// recorded as STOPPED when the adapter winds down.
    pub fn stop_interval_pass(&self, key: SourceKey) -> Result<(), ControlError> {
        let stops = self.inner.interval_stops.lock();
        match stops.get(&key) {
            Some(stop) => {
                stop.trigger();
                Ok(())
            }
            None => Err(ControlError::not_running(key.as_str())),
        }
    }

    async fn execute_pass(
        &self,
        key: SourceKey,
        sync_id: i32,
        actor: &str,
        trigger: RunTrigger,
        stop: StopSignal,
        meta: &RequestMeta,
    ) {
        let started = Instant::now();
        let budget = self.inner.config.timeout_for(key);
        let emitter = ProgressEmitter::new(self.inner.progress.clone(), sync_id);

        let result = match self.inner.adapters.get(&key) {
            Some(adapter) => {
                let adapter = adapter.clone();
                let ctx = AdapterContext {
                    db: self.inner.db.clone(),
                    emitter: emitter.clone(),
                    stop: stop.clone(),
                    actor: actor.to_string(),
                };
                // Inner spawn is the panic boundary: an adapter panic becomes
                // a failed pass, never a dead engine.
                let worker = tokio::spawn(async move { adapter.run(ctx).await });
                let abort = worker.abort_handle();
                match tokio::time::timeout(budget, worker).await {
                    Err(_elapsed) => {
                        stop.trigger();
                        abort.abort();
                        PassResult::Timeout
                    }
                    Ok(Err(join_err)) => {
                        PassResult::Failed(format!("adapter panicked: {}", join_err))
                    }
                    Ok(Ok(Ok(records))) => PassResult::Success(records),
                    Ok(Ok(Err(AdapterError::Stopped))) => PassResult::Stopped,
                    Ok(Ok(Err(AdapterError::Failed(msg)))) => PassResult::Failed(msg),
                }
            }
            None => PassResult::Failed(format!("no adapter registered for {}", key)),
        };

        self.inner.interval_stops.lock().remove(&key);

        let duration_seconds = started.elapsed().as_secs() as i64;
        let next_run_at = self.next_run_for(key).await;

        let outcome = match result {
            PassResult::Success(reported) => {
                let records = match reported {
                    Some(n) => n,
                    // No terminal count in the output: count the canonical
                    // local table. Successful passes only.
                    None => self.canonical_count(key).await.unwrap_or(0),
                };
                emitter.update(100, "done", records);
                emitter.log(
                    LogLevel::Success,
                    format!("Sync completed: {} records", records),
                );
                self.inner
                    .progress
                    .mark_terminal(sync_id, ProgressStatus::Success);
                RunOutcome {
                    status: SyncStatus::Success,
                    records: Some(records),
                    error: None,
                    duration_seconds,
                    next_run_at,
                }
            }
            PassResult::Timeout => {
                emitter.log(
                    LogLevel::Error,
                    format!("Sync timeout after {}", humanize_secs(budget.as_secs())),
                );
                self.inner
                    .progress
                    .mark_terminal(sync_id, ProgressStatus::Failed);
                RunOutcome {
                    status: SyncStatus::Failed,
                    records: None,
                    error: Some("timeout".to_string()),
                    duration_seconds,
                    next_run_at,
                }
            }
            PassResult::Failed(message) => {
                emitter.log(LogLevel::Error, format!("Sync failed: {}", message));
                self.inner
                    .progress
                    .mark_terminal(sync_id, ProgressStatus::Failed);
                RunOutcome {
                    status: SyncStatus::Failed,
                    records: None,
                    error: Some(message),
                    duration_seconds,
                    next_run_at,
                }
            }
            PassResult::Stopped => {
                emitter.log(LogLevel::Info, "Sync stopped by operator");
                self.inner
                    .progress
                    .mark_terminal(sync_id, ProgressStatus::Failed);
                RunOutcome {
                    status: SyncStatus::Stopped,
                    records: None,
                    error: Some("stopped by operator".to_string()),
                    duration_seconds,
                    next_run_at: None,
                }
            }
        };

        let terminal_status = outcome.status;
        let records = outcome.records;
        let error = outcome.error.clone();

        // Progress goes terminal first; a client seeing status != RUNNING in
        // the store can always read the final progress record.
        if let Err(e) = sync_config_store::finish_run(&self.inner.db, key, outcome).await {
            tracing::error!("Failed to record sync outcome for {}: {}", key, e);
        }

        let audit_kind = match terminal_status {
            SyncStatus::Success => trigger.completed_kind(),
            SyncStatus::Stopped => trigger.stopped_kind(),
            _ => trigger.failed_kind(),
        };
        let details = serde_json::json!({
            "records": records,
            "duration_seconds": duration_seconds,
            "error": error,
        });
        if let Err(e) = action_log::append(
            &self.inner.db,
            actor,
            audit_kind,
            key.as_str(),
            Some(details),
            meta,
        )
        .await
        {
            tracing::warn!("Failed to write action log entry: {}", e);
        }

        tracing::info!(
            "Sync pass for {} finished: {} ({}s)",
            key,
            terminal_status,
            duration_seconds
        );
    }

    /// Schedule slot for the next auto run. Interval sources advance on
    /// success and failure alike, so a failing source cannot saturate the
    /// scheduler; continuous sources have no slot.
    async fn next_run_for(&self, key: SourceKey) -> Option<chrono::NaiveDateTime> {
        if key.mode() != SyncMode::Interval {
            return None;
        }
        // Re-read the row: the operator may have edited the interval or the
        // auto flag while the pass ran.
        match sync_config_store::find_by_key(&self.inner.db, key).await {
            Ok(Some(row)) if row.auto_enabled => Some(
                Utc::now().naive_utc() + ChronoDuration::minutes(row.interval_minutes as i64),
            ),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Failed to read sync config for {}: {}", key, e);
                None
            }
        }
    }

    async fn canonical_count(&self, key: SourceKey) -> Option<i64> {
        let count = match key {
            SourceKey::Faculty => FacultyMembers::find().count(&self.inner.db).await,
            SourceKey::Students => Students::find().count(&self.inner.db).await,
            SourceKey::Lms => LmsActivity::find().count(&self.inner.db).await,
        };
        match count {
            Ok(n) => Some(n as i64),
            Err(e) => {
                tracing::warn!("Fallback count failed for {}: {}", key, e);
                None
            }
        }
    }
}

fn humanize_secs(secs: u64) -> String {
    if secs >= 3600 && secs % 3600 == 0 {
        let hours = secs / 3600;
        if hours == 1 {
            "1 hour".to_string()
        } else {
            format!("{} hours", hours)
        }
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{} minutes", secs / 60)
    } else {
        format!("{} seconds", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::sync_config_store::{ensure_defaults, find_by_key, set_auto};
    use crate::testutil::test_db;
    use async_trait::async_trait;
    use sea_orm::Set;
    use std::time::Duration;

    struct StubAdapter {
        key: SourceKey,
        result: Result<Option<i64>, AdapterError>,
        delay: Duration,
    }

    #[async_trait]
    impl SourceAdapter for StubAdapter {
        fn key(&self) -> SourceKey {
            self.key
        }

        async fn run(&self, ctx: AdapterContext) -> Result<Option<i64>, AdapterError> {
            if !self.delay.is_zero() {
                tokio::select! {
                    _ = ctx.stop.triggered() => return Err(AdapterError::Stopped),
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }
            self.result.clone()
        }
    }

    struct PanicAdapter;

    #[async_trait]
    impl SourceAdapter for PanicAdapter {
        fn key(&self) -> SourceKey {
            SourceKey::Faculty
        }

        async fn run(&self, _ctx: AdapterContext) -> Result<Option<i64>, AdapterError> {
            panic!("adapter blew up");
        }
    }

    async fn engine_with(adapter: StubAdapter) -> SyncEngine {
        let db = test_db().await;
        ensure_defaults(&db).await.unwrap();
        SyncEngine::new(db, OrchestratorConfig::default(), vec![Arc::new(adapter)])
    }

    #[tokio::test]
    async fn successful_pass_records_outcome_and_schedule() {
        let engine = engine_with(StubAdapter {
            key: SourceKey::Faculty,
            result: Ok(Some(123)),
            delay: Duration::ZERO,
        })
        .await;
        set_auto(engine.db(), SourceKey::Faculty, true, Some(60))
            .await
            .unwrap();

        let started = engine
            .run_once(
                SourceKey::Faculty,
                "admin",
                RunTrigger::Manual,
                &RequestMeta::default(),
            )
            .await
            .unwrap();
        started.handle.await.unwrap();

        let row = find_by_key(engine.db(), SourceKey::Faculty)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, "SUCCESS");
        assert_eq!(row.last_records_synced, Some(123));
        assert_eq!(row.last_triggered_by.as_deref(), Some("admin"));
        assert!(row.last_error.is_none());

        // next_run_at = end + interval, within tolerance
        let expected = Utc::now().naive_utc() + ChronoDuration::minutes(60);
        let next = row.next_run_at.unwrap();
        assert!((expected - next).num_seconds().abs() < 10);

        let snap = engine.progress().get(started.sync_id).unwrap();
        assert_eq!(snap.status, ProgressStatus::Success);
        assert_eq!(snap.percent, 100);
        assert_eq!(snap.records_processed, 123);

        let entries = action_log::recent_for_target(engine.db(), "FACULTY", 10)
            .await
            .unwrap();
        let kinds: Vec<_> = entries.iter().map(|e| e.action_kind.as_str()).collect();
        assert!(kinds.contains(&actions::MANUAL_SYNC_STARTED));
        assert!(kinds.contains(&actions::MANUAL_SYNC_COMPLETED));
    }

    #[tokio::test]
    async fn double_trigger_is_rejected_with_single_audit_entry() {
        let engine = engine_with(StubAdapter {
            key: SourceKey::Faculty,
            result: Ok(Some(1)),
            delay: Duration::from_millis(500),
        })
        .await;

        let first = engine
            .run_once(
                SourceKey::Faculty,
                "alice",
                RunTrigger::Manual,
                &RequestMeta::default(),
            )
            .await
            .unwrap();
        let second = engine
            .run_once(
                SourceKey::Faculty,
                "bob",
                RunTrigger::Manual,
                &RequestMeta::default(),
            )
            .await;
        assert_eq!(
            second.unwrap_err().kind,
            crate::models::error::ErrorKind::AlreadyRunning
        );
        first.handle.await.unwrap();

        let entries = action_log::recent_for_target(engine.db(), "FACULTY", 10)
            .await
            .unwrap();
        let started: Vec<_> = entries
            .iter()
            .filter(|e| e.action_kind == actions::MANUAL_SYNC_STARTED)
            .collect();
        assert_eq!(started.len(), 1);
    }

    #[tokio::test]
    async fn timeout_fails_the_pass_and_advances_schedule() {
        let db = test_db().await;
        ensure_defaults(&db).await.unwrap();
        set_auto(&db, SourceKey::Faculty, true, Some(60)).await.unwrap();
        let config = OrchestratorConfig {
            faculty_timeout_secs: 1,
            ..Default::default()
        };
        let engine = SyncEngine::new(
            db,
            config,
            vec![Arc::new(StubAdapter {
                key: SourceKey::Faculty,
                result: Ok(Some(1)),
                delay: Duration::from_secs(30),
            })],
        );

        let started = engine
            .run_once(
                SourceKey::Faculty,
                "system",
                RunTrigger::Auto,
                &RequestMeta::default(),
            )
            .await
            .unwrap();
        started.handle.await.unwrap();

        let row = find_by_key(engine.db(), SourceKey::Faculty)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, "FAILED");
        assert_eq!(row.last_error.as_deref(), Some("timeout"));
        // a failed source does not block the schedule
        assert!(row.next_run_at.is_some());

        let snap = engine.progress().get(started.sync_id).unwrap();
        assert_eq!(snap.status, ProgressStatus::Failed);
        assert!(snap
            .logs
            .iter()
            .any(|l| l.message.contains("Sync timeout after")));
    }

    #[tokio::test]
    async fn operator_stop_lands_in_sticky_stopped() {
        let engine = engine_with(StubAdapter {
            key: SourceKey::Students,
            result: Ok(Some(1)),
            delay: Duration::from_secs(30),
        })
        .await;

        let started = engine
            .run_once(
                SourceKey::Students,
                "admin",
                RunTrigger::Manual,
                &RequestMeta::default(),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        engine.stop_interval_pass(SourceKey::Students).unwrap();
        started.handle.await.unwrap();

        let row = find_by_key(engine.db(), SourceKey::Students)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, "STOPPED");

        // stopping again: nothing in flight
        assert!(engine.stop_interval_pass(SourceKey::Students).is_err());
    }

    #[tokio::test]
    async fn missing_count_falls_back_to_canonical_table() {
        let engine = engine_with(StubAdapter {
            key: SourceKey::Faculty,
            result: Ok(None),
            delay: Duration::ZERO,
        })
        .await;

        for i in 0..3 {
            let row = crate::entities::faculty_members::ActiveModel {
                employee_no: Set(format!("E{}", i)),
                full_name: Set(format!("Member {}", i)),
                ..Default::default()
            };
            use sea_orm::ActiveModelTrait;
            row.insert(engine.db()).await.unwrap();
        }

        let started = engine
            .run_once(
                SourceKey::Faculty,
                "system",
                RunTrigger::Auto,
                &RequestMeta::default(),
            )
            .await
            .unwrap();
        started.handle.await.unwrap();

        let row = find_by_key(engine.db(), SourceKey::Faculty)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, "SUCCESS");
        assert_eq!(row.last_records_synced, Some(3));
    }

    #[tokio::test]
    async fn adapter_panic_becomes_failed_pass() {
        let db = test_db().await;
        ensure_defaults(&db).await.unwrap();
        let engine = SyncEngine::new(
            db,
            OrchestratorConfig::default(),
            vec![Arc::new(PanicAdapter)],
        );

        let started = engine
            .run_once(
                SourceKey::Faculty,
                "system",
                RunTrigger::Auto,
                &RequestMeta::default(),
            )
            .await
            .unwrap();
        started.handle.await.unwrap();

        let row = find_by_key(engine.db(), SourceKey::Faculty)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, "FAILED");
        assert!(row.last_error.unwrap().contains("panicked"));
    }

    #[test]
    fn humanizes_round_durations() {
        assert_eq!(humanize_secs(3600), "1 hour");
        assert_eq!(humanize_secs(7200), "2 hours");
        assert_eq!(humanize_secs(1800), "30 minutes");
        assert_eq!(humanize_secs(45), "45 seconds");
    }
}

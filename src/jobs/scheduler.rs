//! Scheduler Loop
//!
//! One ticking task drives everything time-based: reviving continuous
//! loops, dispatching due interval sources, and purging expired progress
//! records. A tick that hits an error logs it and moves on; the loop
//! itself only exits on process shutdown.

use chrono::Utc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::jobs::engine::{RunTrigger, SyncEngine};
use crate::models::error::ErrorKind;
use crate::models::source::{SourceKey, SyncMode};
use crate::services::action_log::RequestMeta;
use crate::services::config::SYSTEM_ACTOR;
use crate::services::sync_config_store;

pub fn spawn_scheduler(engine: SyncEngine) -> JoinHandle<()> {
    tokio::spawn(async move {
        let shutdown = engine.shutdown_signal();
        let mut ticker =
            tokio::time::interval(Duration::from_secs(engine.config().scheduler_tick_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            "Scheduler started (tick every {}s)",
            engine.config().scheduler_tick_secs
        );
        loop {
            tokio::select! {
                _ = shutdown.triggered() => {
                    tracing::info!("Scheduler exiting");
                    break;
                }
                _ = ticker.tick() => {
                    tick(&engine).await;
                }
            }
        }
    })
}

async fn tick(engine: &SyncEngine) {
    // continuous sources first, so a burst of due interval work never
    // delays reviving a dropped loop
    for key in SourceKey::ALL {
        if key.mode() == SyncMode::Continuous {
            engine.ensure_running_if_enabled(key).await;
        }
    }

    let now = Utc::now().naive_utc();
    let due = match sync_config_store::due_interval_sources(engine.db(), now).await {
        Ok(due) => due,
        Err(e) => {
            tracing::warn!("Scheduler tick failed to query due sources: {}", e);
            return;
        }
    };

    for row in due {
        let key = match row.source_key.parse::<SourceKey>() {
            Ok(key) => key,
            Err(_) => {
                tracing::warn!("Unknown source key in sync_config: {}", row.source_key);
                continue;
            }
        };
        match engine
            .run_once(key, SYSTEM_ACTOR, RunTrigger::Auto, &RequestMeta::default())
            .await
        {
            Ok(started) => {
                tracing::info!("Scheduled sync dispatched for {}", key);
                // the pass runs detached; its outcome lands in the store
                drop(started.handle);
            }
            // lost a race with a manual trigger; the next tick catches up
            Err(e) if e.kind == ErrorKind::AlreadyRunning => {}
            Err(e) => {
                tracing::warn!("Scheduler failed to dispatch {}: {}", key, e);
            }
        }
    }

    engine.progress().purge_old();
}

//! Orchestrator configuration
//!
//! All knobs come from the environment with documented defaults. Source
//! modes are fixed at compile time (`SourceKey::mode`); only cadences and
//! timeouts are tunable here.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::models::source::SourceKey;

/// Actor recorded when a run is machine-initiated.
pub const SYSTEM_ACTOR: &str = "system";

/// Scheduler cadence in seconds.
const ENV_SCHEDULER_TICK: &str = "SYNC_SCHEDULER_TICK_SECS";

/// Progress log ring capacity.
const ENV_PROGRESS_RING_SIZE: &str = "SYNC_PROGRESS_RING_SIZE";

/// Grace period before terminal progress records are purged.
const ENV_PROGRESS_GRACE: &str = "SYNC_PROGRESS_GRACE_SECS";

/// Per-source watchdog timeouts for interval (and manual LMS) passes.
const ENV_FACULTY_TIMEOUT: &str = "SYNC_FACULTY_TIMEOUT_SECS";
const ENV_STUDENTS_TIMEOUT: &str = "SYNC_STUDENTS_TIMEOUT_SECS";
const ENV_LMS_TIMEOUT: &str = "SYNC_LMS_TIMEOUT_SECS";

/// Sleep between continuous LMS iterations.
const ENV_LMS_FETCH_INTERVAL: &str = "SYNC_LMS_FETCH_INTERVAL_SECS";

const DEFAULT_SCHEDULER_TICK_SECS: u64 = 60;
const DEFAULT_FACULTY_TIMEOUT_SECS: u64 = 3600;
const DEFAULT_STUDENTS_TIMEOUT_SECS: u64 = 7200;
const DEFAULT_LMS_TIMEOUT_SECS: u64 = 1800;
const DEFAULT_LMS_FETCH_INTERVAL_SECS: u64 = 60;

/// Back-off after a fatal continuous-iteration error.
const DEFAULT_ERROR_BACKOFF_SECS: u64 = 60;

/// How long a stop waits for a continuous worker to join.
const DEFAULT_STOP_JOIN_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub scheduler_tick_secs: u64,
    pub progress_ring_size: usize,
    pub progress_grace_secs: i64,
    pub faculty_timeout_secs: u64,
    pub students_timeout_secs: u64,
    pub lms_timeout_secs: u64,
    pub lms_fetch_interval_secs: u64,
    pub error_backoff_secs: u64,
    pub stop_join_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            scheduler_tick_secs: DEFAULT_SCHEDULER_TICK_SECS,
            progress_ring_size: crate::services::progress::DEFAULT_LOG_RING_SIZE,
            progress_grace_secs: crate::services::progress::DEFAULT_PURGE_GRACE_SECS,
            faculty_timeout_secs: DEFAULT_FACULTY_TIMEOUT_SECS,
            students_timeout_secs: DEFAULT_STUDENTS_TIMEOUT_SECS,
            lms_timeout_secs: DEFAULT_LMS_TIMEOUT_SECS,
            lms_fetch_interval_secs: DEFAULT_LMS_FETCH_INTERVAL_SECS,
            error_backoff_secs: DEFAULT_ERROR_BACKOFF_SECS,
            stop_join_secs: DEFAULT_STOP_JOIN_SECS,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            scheduler_tick_secs: env_or(ENV_SCHEDULER_TICK, defaults.scheduler_tick_secs),
            progress_ring_size: env_or(ENV_PROGRESS_RING_SIZE, defaults.progress_ring_size),
            progress_grace_secs: env_or(ENV_PROGRESS_GRACE, defaults.progress_grace_secs),
            faculty_timeout_secs: env_or(ENV_FACULTY_TIMEOUT, defaults.faculty_timeout_secs),
            students_timeout_secs: env_or(ENV_STUDENTS_TIMEOUT, defaults.students_timeout_secs),
            lms_timeout_secs: env_or(ENV_LMS_TIMEOUT, defaults.lms_timeout_secs),
            lms_fetch_interval_secs: env_or(
                ENV_LMS_FETCH_INTERVAL,
                defaults.lms_fetch_interval_secs,
            ),
            error_backoff_secs: defaults.error_backoff_secs,
            stop_join_secs: defaults.stop_join_secs,
        }
    }

    /// Watchdog budget for one pass of the given source.
    pub fn timeout_for(&self, key: SourceKey) -> Duration {
        let secs = match key {
            SourceKey::Faculty => self.faculty_timeout_secs,
            SourceKey::Students => self.students_timeout_secs,
            SourceKey::Lms => self.lms_timeout_secs,
        };
        Duration::from_secs(secs)
    }
}

fn env_or<T: FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!("{} has unparseable value {:?}, using default", name, raw);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = OrchestratorConfig::default();
        assert_eq!(cfg.scheduler_tick_secs, 60);
        assert_eq!(cfg.progress_ring_size, 100);
        assert_eq!(cfg.progress_grace_secs, 3600);
        assert_eq!(cfg.timeout_for(SourceKey::Faculty).as_secs(), 3600);
        assert_eq!(cfg.timeout_for(SourceKey::Students).as_secs(), 7200);
        assert_eq!(cfg.timeout_for(SourceKey::Lms).as_secs(), 1800);
        assert_eq!(cfg.lms_fetch_interval_secs, 60);
    }
}

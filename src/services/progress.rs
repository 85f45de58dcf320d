//! Progress Registry
//!
//! Process-wide in-memory map from sync id to the live progress of a run:
//! status, percent, step label, records processed and a bounded ring of log
//! entries. All state sits behind a single mutex; every operation is O(1)
//! expected. Progress tracking must never crash a running sync, so nothing
//! here returns an error.

use chrono::{Duration, NaiveDateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::models::status::{LogLevel, ProgressStatus};

/// Default capacity of the per-run log ring.
pub const DEFAULT_LOG_RING_SIZE: usize = 100;

/// Default grace period before a terminal record is purged (seconds).
pub const DEFAULT_PURGE_GRACE_SECS: i64 = 3600;

/// One entry in the bounded log ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressLogEntry {
    pub timestamp: NaiveDateTime,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone)]
struct ProgressRecord {
    status: ProgressStatus,
    percent: u8,
    step_label: String,
    records_processed: i64,
    started_at: NaiveDateTime,
    log_ring: VecDeque<ProgressLogEntry>,
    terminal_at: Option<NaiveDateTime>,
}

/// Read-only view of a progress record, as served to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub sync_id: i32,
    pub status: ProgressStatus,
    pub percent: u8,
    pub step_label: String,
    pub records_processed: i64,
    pub started_at: NaiveDateTime,
    pub logs: Vec<ProgressLogEntry>,
}

/// Partial update applied to a progress record.
#[derive(Debug, Default, Clone)]
pub struct ProgressPatch {
    pub status: Option<ProgressStatus>,
    pub percent: Option<u8>,
    pub step_label: Option<String>,
    pub records_processed: Option<i64>,
}

#[derive(Clone)]
pub struct ProgressRegistry {
    inner: Arc<Mutex<HashMap<i32, ProgressRecord>>>,
    ring_size: usize,
    grace: Duration,
}

impl ProgressRegistry {
    pub fn new(ring_size: usize, grace_secs: i64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ring_size: ring_size.max(1),
            grace: Duration::seconds(grace_secs),
        }
    }

    /// Create a fresh record for a run that is starting. Any leftover record
    /// for the same sync id (a previous run awaiting purge) is replaced.
    pub fn begin(&self, sync_id: i32) {
        let mut map = self.inner.lock();
        map.insert(
            sync_id,
            ProgressRecord {
                status: ProgressStatus::Running,
                percent: 0,
                step_label: "starting".to_string(),
                records_processed: 0,
                started_at: Utc::now().naive_utc(),
                log_ring: VecDeque::with_capacity(self.ring_size),
                terminal_at: None,
            },
        );
    }

    pub fn get(&self, sync_id: i32) -> Option<ProgressSnapshot> {
        let map = self.inner.lock();
        map.get(&sync_id).map(|rec| ProgressSnapshot {
            sync_id,
            status: rec.status,
            percent: rec.percent,
            step_label: rec.step_label.clone(),
            records_processed: rec.records_processed,
            started_at: rec.started_at,
            logs: rec.log_ring.iter().cloned().collect(),
        })
    }

    /// Merge a patch into the record, creating it on first call.
    pub fn update(&self, sync_id: i32, patch: ProgressPatch) {
        let mut map = self.inner.lock();
        let rec = map.entry(sync_id).or_insert_with(|| ProgressRecord {
            status: ProgressStatus::Running,
            percent: 0,
            step_label: "starting".to_string(),
            records_processed: 0,
            started_at: Utc::now().naive_utc(),
            log_ring: VecDeque::new(),
            terminal_at: None,
        });
        if let Some(status) = patch.status {
            rec.status = status;
        }
        if let Some(percent) = patch.percent {
            rec.percent = percent.min(100);
        }
        if let Some(step) = patch.step_label {
            rec.step_label = step;
        }
        if let Some(records) = patch.records_processed {
            rec.records_processed = records;
        }
    }

    /// Timestamp and push a log entry, evicting the oldest when the ring
    /// is full.
    pub fn append_log(&self, sync_id: i32, level: LogLevel, message: impl Into<String>) {
        let mut map = self.inner.lock();
        let rec = match map.get_mut(&sync_id) {
            Some(rec) => rec,
            None => {
                // A log for an unknown run is dropped, not an error.
                return;
            }
        };
        while rec.log_ring.len() >= self.ring_size {
            rec.log_ring.pop_front();
        }
        rec.log_ring.push_back(ProgressLogEntry {
            timestamp: Utc::now().naive_utc(),
            level,
            message: message.into(),
        });
    }

    /// Set the terminal status and start the purge clock.
    pub fn mark_terminal(&self, sync_id: i32, status: ProgressStatus) {
        let mut map = self.inner.lock();
        if let Some(rec) = map.get_mut(&sync_id) {
            rec.status = status;
            if status == ProgressStatus::Success {
                rec.percent = 100;
            }
            rec.terminal_at = Some(Utc::now().naive_utc());
        }
    }

    /// Drop records whose terminal time is older than the grace period.
    pub fn purge_old(&self) {
        let cutoff = Utc::now().naive_utc() - self.grace;
        let mut map = self.inner.lock();
        map.retain(|_, rec| match rec.terminal_at {
            Some(t) => t > cutoff,
            None => true,
        });
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

/// Handle an adapter uses to push progress events for one run.
#[derive(Clone)]
pub struct ProgressEmitter {
    registry: ProgressRegistry,
    sync_id: i32,
}

impl ProgressEmitter {
    pub fn new(registry: ProgressRegistry, sync_id: i32) -> Self {
        Self { registry, sync_id }
    }

    pub fn sync_id(&self) -> i32 {
        self.sync_id
    }

    pub fn update(&self, percent: u8, step_label: &str, records_processed: i64) {
        self.registry.update(
            self.sync_id,
            ProgressPatch {
                percent: Some(percent),
                step_label: Some(step_label.to_string()),
                records_processed: Some(records_processed),
                ..Default::default()
            },
        );
    }

    pub fn records(&self, records_processed: i64) {
        self.registry.update(
            self.sync_id,
            ProgressPatch {
                records_processed: Some(records_processed),
                ..Default::default()
            },
        );
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.registry.append_log(self.sync_id, level, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_and_get() {
        let reg = ProgressRegistry::new(100, 3600);
        reg.begin(1);
        let snap = reg.get(1).unwrap();
        assert_eq!(snap.status, ProgressStatus::Running);
        assert_eq!(snap.percent, 0);
        assert_eq!(snap.step_label, "starting");
        assert!(reg.get(2).is_none());
    }

    #[test]
    fn update_merges_fields() {
        let reg = ProgressRegistry::new(100, 3600);
        reg.begin(1);
        reg.update(
            1,
            ProgressPatch {
                percent: Some(40),
                records_processed: Some(7),
                ..Default::default()
            },
        );
        let snap = reg.get(1).unwrap();
        assert_eq!(snap.percent, 40);
        assert_eq!(snap.records_processed, 7);
        // untouched fields survive the merge
        assert_eq!(snap.step_label, "starting");
    }

    #[test]
    fn update_creates_record_on_first_call() {
        let reg = ProgressRegistry::new(100, 3600);
        reg.update(
            9,
            ProgressPatch {
                percent: Some(50),
                ..Default::default()
            },
        );
        assert_eq!(reg.get(9).unwrap().percent, 50);
    }

    #[test]
    fn log_ring_evicts_oldest_beyond_capacity() {
        let reg = ProgressRegistry::new(100, 3600);
        reg.begin(1);
        for i in 0..250 {
            reg.append_log(1, LogLevel::Info, format!("line {}", i));
        }
        let snap = reg.get(1).unwrap();
        assert_eq!(snap.logs.len(), 100);
        // last 100 entries, still in emission order
        assert_eq!(snap.logs.first().unwrap().message, "line 150");
        assert_eq!(snap.logs.last().unwrap().message, "line 249");
    }

    #[test]
    fn percent_is_clamped() {
        let reg = ProgressRegistry::new(100, 3600);
        reg.begin(1);
        reg.update(
            1,
            ProgressPatch {
                percent: Some(250),
                ..Default::default()
            },
        );
        assert_eq!(reg.get(1).unwrap().percent, 100);
    }

    #[test]
    fn terminal_success_forces_full_percent() {
        let reg = ProgressRegistry::new(100, 3600);
        reg.begin(1);
        reg.update(
            1,
            ProgressPatch {
                percent: Some(60),
                ..Default::default()
            },
        );
        reg.mark_terminal(1, ProgressStatus::Success);
        let snap = reg.get(1).unwrap();
        assert_eq!(snap.status, ProgressStatus::Success);
        assert_eq!(snap.percent, 100);
    }

    #[test]
    fn purge_removes_only_expired_terminals() {
        let reg = ProgressRegistry::new(100, 0); // zero grace: purge immediately
        reg.begin(1);
        reg.begin(2);
        reg.mark_terminal(1, ProgressStatus::Failed);
        reg.purge_old();
        assert!(reg.get(1).is_none());
        // the still-running record survives
        assert!(reg.get(2).is_some());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn failed_record_remains_readable_until_purge() {
        let reg = ProgressRegistry::new(100, 3600);
        reg.begin(1);
        reg.append_log(1, LogLevel::Error, "boom");
        reg.mark_terminal(1, ProgressStatus::Failed);
        reg.purge_old();
        let snap = reg.get(1).unwrap();
        assert_eq!(snap.status, ProgressStatus::Failed);
        assert_eq!(snap.logs.last().unwrap().message, "boom");
    }
}

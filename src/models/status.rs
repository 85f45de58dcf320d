//! Status vocabularies for sync configs and progress records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Durable status of a source in the sync_config table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Idle,
    Running,
    /// Sticky: the scheduler never leaves this state on its own.
    Stopped,
    Failed,
    Success,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "IDLE",
            SyncStatus::Running => "RUNNING",
            SyncStatus::Stopped => "STOPPED",
            SyncStatus::Failed => "FAILED",
            SyncStatus::Success => "SUCCESS",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IDLE" => Ok(SyncStatus::Idle),
            "RUNNING" => Ok(SyncStatus::Running),
            "STOPPED" => Ok(SyncStatus::Stopped),
            "FAILED" => Ok(SyncStatus::Failed),
            "SUCCESS" => Ok(SyncStatus::Success),
            other => Err(format!("unknown sync status: {}", other)),
        }
    }
}

/// In-memory status of a live or recently-finished progress record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressStatus {
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "COMPLETED-CONTINUOUS")]
    CompletedContinuous,
}

impl ProgressStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressStatus::Running)
    }
}

/// Severity of a progress log ring entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Info,
    Error,
    Success,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_status_round_trips() {
        for s in [
            SyncStatus::Idle,
            SyncStatus::Running,
            SyncStatus::Stopped,
            SyncStatus::Failed,
            SyncStatus::Success,
        ] {
            assert_eq!(s.as_str().parse::<SyncStatus>().unwrap(), s);
        }
    }

    #[test]
    fn continuous_terminal_tag_uses_hyphen() {
        let json = serde_json::to_string(&ProgressStatus::CompletedContinuous).unwrap();
        assert_eq!(json, "\"COMPLETED-CONTINUOUS\"");
    }
}

//! Source catalog
//!
//! The closed set of upstream systems this orchestrator ingests. The mode of
//! a source is fixed by its kind and is not editable at runtime.

use std::fmt;
use std::str::FromStr;

/// Upstream source identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKey {
    /// Faculty registry (interval-driven batch).
    Faculty,
    /// Student registry (interval-driven batch).
    Students,
    /// Learning-Management-System telemetry (continuous polling).
    Lms,
}

/// Lifecycle mode of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Interval,
    Continuous,
}

impl SourceKey {
    pub const ALL: [SourceKey; 3] = [SourceKey::Faculty, SourceKey::Students, SourceKey::Lms];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKey::Faculty => "FACULTY",
            SourceKey::Students => "STUDENTS",
            SourceKey::Lms => "LMS",
        }
    }

    pub fn mode(&self) -> SyncMode {
        match self {
            SourceKey::Faculty | SourceKey::Students => SyncMode::Interval,
            SourceKey::Lms => SyncMode::Continuous,
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FACULTY" => Ok(SourceKey::Faculty),
            "STUDENTS" => Ok(SourceKey::Students),
            "LMS" => Ok(SourceKey::Lms),
            other => Err(format!("unknown source key: {}", other)),
        }
    }
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Interval => "INTERVAL",
            SyncMode::Continuous => "CONTINUOUS",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Fetch-script output markers
//!
//! The upstream fetch routines are opaque subprocesses; the only contract
//! is their textual output. This parser recognises the marker substrings
//! the scripts are known to print and accumulates the record count across
//! a whole pass.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::status::LogLevel;

lazy_static! {
    static ref RE_STUDENTS_COUNT: Regex = Regex::new(r"Students count:\s*(\d+)").unwrap();
    static ref RE_FACULTY_COUNT: Regex =
        Regex::new(r"faculty records inserted(?:/updated)?:\s*(\d+)").unwrap();
    static ref RE_STORED: Regex = Regex::new(r"Stored\s+(\d+)\s+records").unwrap();
    static ref RE_PHASE: Regex =
        Regex::new(r"Fetching for Pardis\s+(\S+).*Term\s+(\S+)").unwrap();
}

/// Effects of one output line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineOutcome {
    /// Log entry to forward to the progress ring.
    pub log: Option<(LogLevel, String)>,
    /// Phase label when the line announced a new fetch phase.
    pub phase: Option<String>,
    /// New cumulative record total when the line carried a count.
    pub records_total: Option<i64>,
    /// The script printed its terminal success hint.
    pub done: bool,
}

#[derive(Debug, Default)]
pub struct OutputParser {
    total: Option<i64>,
    phases: u32,
    saw_all_done: bool,
}

impl OutputParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of phase markers seen so far.
    pub fn phases(&self) -> u32 {
        self.phases
    }

    pub fn saw_all_done(&self) -> bool {
        self.saw_all_done
    }

    /// Final record count, if the output ever carried one.
    pub fn final_records(&self) -> Option<i64> {
        self.total
    }

    pub fn feed(&mut self, line: &str) -> LineOutcome {
        let mut outcome = LineOutcome::default();

        let content = if let Some(rest) = line.trim().strip_prefix("[INFO]") {
            outcome.log = Some((LogLevel::Info, rest.trim().to_string()));
            rest
        } else if let Some(rest) = line.trim().strip_prefix("[ERROR]") {
            outcome.log = Some((LogLevel::Error, rest.trim().to_string()));
            rest
        } else {
            line
        };

        if let Some(caps) = RE_PHASE.captures(content) {
            self.phases += 1;
            outcome.phase = Some(format!("Pardis {} term {}", &caps[1], &caps[2]));
        }

        if let Some(caps) = RE_STUDENTS_COUNT.captures(content) {
            if let Ok(n) = caps[1].parse::<i64>() {
                // per-campus counts accumulate
                self.total = Some(self.total.unwrap_or(0) + n);
                outcome.records_total = self.total;
            }
        }

        if let Some(caps) = RE_FACULTY_COUNT.captures(content) {
            if let Ok(n) = caps[1].parse::<i64>() {
                // the faculty script prints one final total
                self.total = Some(n);
                outcome.records_total = self.total;
            }
        }

        if let Some(caps) = RE_STORED.captures(content) {
            if let Ok(n) = caps[1].parse::<i64>() {
                self.total = Some(self.total.unwrap_or(0) + n);
                outcome.records_total = self.total;
            }
        }

        if content.contains("All done") {
            self.saw_all_done = true;
            outcome.done = true;
        }

        outcome
    }
}

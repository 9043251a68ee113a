//! Rust structs mapping to database tables.
//!
//! Each model implements `from_row` for constructing itself from a
//! `rusqlite::Row`.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use gf_core::{Error, JobData, JobId, JobState, Priority};
use rusqlite::types::Type;
use serde::Serialize;

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

/// Render a timestamp the way every column stores it. Fixed width with
/// millisecond precision, so text comparison matches time order.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time in storage format.
pub fn now_ts() -> String {
    format_ts(Utc::now())
}

fn conversion_err(idx: usize, ty: Type, e: Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(e))
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    #[serde(rename = "type")]
    pub job_type: String,
    pub data: JobData,
    pub priority: Priority,
    pub state: JobState,
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub backoff: bool,
    pub remove_on_complete: bool,
    pub error: Option<String>,
    pub run_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl Job {
    /// Build from a row selected as all columns in table order.
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let data_json: String = row.get(2)?;
        let data: JobData = serde_json::from_str(&data_json).map_err(|e| {
            conversion_err(2, Type::Text, Error::Validation(format!("job data: {e}")))
        })?;

        let rank: i32 = row.get(3)?;
        let priority = Priority::from_rank(rank).ok_or_else(|| {
            conversion_err(
                3,
                Type::Integer,
                Error::Validation(format!("unknown priority rank {rank}")),
            )
        })?;

        let state_text: String = row.get(4)?;
        let state = state_text
            .parse::<JobState>()
            .map_err(|e| conversion_err(4, Type::Text, e))?;

        Ok(Self {
            id: JobId::new(row.get(0)?),
            job_type: row.get(1)?,
            data,
            priority,
            state,
            attempts_made: row.get(5)?,
            max_attempts: row.get(6)?,
            backoff: row.get(7)?,
            remove_on_complete: row.get(8)?,
            error: row.get(9)?,
            run_at: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
            started_at: row.get(13)?,
            completed_at: row.get(14)?,
        })
    }

    /// String value of a data key, if present and a string.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Attempts left before the job fails permanently.
    pub fn attempts_remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts_made)
    }

    /// An inactive job held back by backoff until `run_at`.
    pub fn is_delayed(&self) -> bool {
        self.state == JobState::Inactive
            && self.run_at.as_deref().is_some_and(|at| at > now_ts().as_str())
    }
}

// ---------------------------------------------------------------------------
// LogEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub id: i64,
    pub job_id: JobId,
    pub logged_at: String,
    pub message: String,
}

impl LogEntry {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            job_id: JobId::new(row.get(1)?),
            logged_at: row.get(2)?,
            message: row.get(3)?,
        })
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.logged_at, self.message)
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Filter for administrative job listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFilter {
    pub job_type: Option<String>,
    pub state: Option<JobState>,
    pub offset: i64,
    pub limit: i64,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            job_type: None,
            state: None,
            offset: 0,
            limit: 100,
        }
    }
}

impl JobFilter {
    pub fn state(mut self, state: JobState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn job_type(mut self, job_type: impl Into<String>) -> Self {
        self.job_type = Some(job_type.into());
        self
    }
}

/// Number of jobs per state. `delayed` is the subset of `inactive` waiting
/// on backoff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub inactive: u64,
    pub delayed: u64,
    pub active: u64,
    pub complete: u64,
    pub failed: u64,
}

impl JobCounts {
    pub fn total(&self) -> u64 {
        self.inactive + self.active + self.complete + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_are_fixed_width() {
        let a = format_ts(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
        assert_eq!(a, "2024-01-02T03:04:05.000Z");
        let b = format_ts(Utc.with_ymd_and_hms(2024, 11, 2, 3, 4, 5).unwrap());
        assert!(a < b);
    }

    #[test]
    fn log_entry_display() {
        let entry = LogEntry {
            id: 1,
            job_id: JobId::new(3),
            logged_at: "2024-01-02T03:04:05.000Z".into(),
            message: "Deleted ZIP".into(),
        };
        assert_eq!(entry.to_string(), "[2024-01-02T03:04:05.000Z] Deleted ZIP");
    }
}

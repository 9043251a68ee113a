//! The [`JobStore`] trait and its SQLite implementation.
//!
//! Store calls are short and synchronous. Async callers invoke them directly
//! and never keep a connection across an `.await`; each method checks out a
//! pooled connection, runs its statements and returns it.

use chrono::{DateTime, Utc};
use gf_core::{Error, JobData, JobId, JobOptions, JobState, Result};

use crate::models::{Job, JobCounts, JobFilter, LogEntry};
use crate::pool::{get_conn, DbPool};
use crate::queries::{jobs, logs};

/// Durable job record storage.
pub trait JobStore: Send + Sync {
    /// Persist a new job in `inactive`.
    fn create(&self, job_type: &str, data: JobData, options: &JobOptions) -> Result<Job>;

    fn get(&self, id: JobId) -> Result<Job>;

    /// Key-wise merge into the job's data in one transaction.
    fn merge_data(&self, id: JobId, partial: &JobData) -> Result<Job>;

    fn append_log(&self, id: JobId, message: &str) -> Result<LogEntry>;

    fn logs(&self, id: JobId) -> Result<Vec<LogEntry>>;

    /// Change state, rejecting edges the state machine does not have.
    fn set_state(&self, id: JobId, state: JobState) -> Result<Job>;

    /// Atomically move the next due job of `job_type` to `active`.
    fn claim_next(&self, job_type: &str) -> Result<Option<Job>>;

    fn complete(&self, id: JobId) -> Result<Job>;

    /// Fail an active job; `retry_at` schedules a delayed retry instead of
    /// the terminal state.
    fn fail(&self, id: JobId, reason: &str, retry_at: Option<DateTime<Utc>>) -> Result<Job>;

    /// Like [`fail`](JobStore::fail), but only while the job is still
    /// `active` with the heartbeat `seen_heartbeat`. `Ok(None)` means the
    /// job moved on since it was observed and nothing was written.
    fn fail_stale(
        &self,
        id: JobId,
        reason: &str,
        retry_at: Option<DateTime<Utc>>,
        seen_heartbeat: &str,
    ) -> Result<Option<Job>>;

    /// Heartbeat. `Ok(false)` means the job is no longer active.
    fn touch(&self, id: JobId) -> Result<bool>;

    fn find_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>>;

    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>>;

    fn counts(&self, job_type: Option<&str>) -> Result<JobCounts>;

    fn remove(&self, id: JobId) -> Result<()>;

    /// Delete completed jobs flagged remove-on-complete, returning how many.
    fn purge_completed(&self) -> Result<usize>;
}

/// [`JobStore`] backed by an r2d2 SQLite pool.
#[derive(Clone)]
pub struct SqliteJobStore {
    pool: DbPool,
}

impl SqliteJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, job_type: &str, data: JobData, options: &JobOptions) -> Result<Job> {
        let conn = get_conn(&self.pool)?;
        jobs::create_job(&conn, job_type, &data, options)
    }

    fn get(&self, id: JobId) -> Result<Job> {
        let conn = get_conn(&self.pool)?;
        jobs::get_job(&conn, id)?.ok_or_else(|| Error::not_found("job", id))
    }

    fn merge_data(&self, id: JobId, partial: &JobData) -> Result<Job> {
        let conn = get_conn(&self.pool)?;
        jobs::merge_job_data(&conn, id, partial)
    }

    fn append_log(&self, id: JobId, message: &str) -> Result<LogEntry> {
        let conn = get_conn(&self.pool)?;
        logs::append_log(&conn, id, message)
    }

    fn logs(&self, id: JobId) -> Result<Vec<LogEntry>> {
        let conn = get_conn(&self.pool)?;
        logs::list_logs(&conn, id)
    }

    fn set_state(&self, id: JobId, state: JobState) -> Result<Job> {
        let conn = get_conn(&self.pool)?;
        jobs::set_job_state(&conn, id, state)
    }

    fn claim_next(&self, job_type: &str) -> Result<Option<Job>> {
        let conn = get_conn(&self.pool)?;
        jobs::claim_next(&conn, job_type)
    }

    fn complete(&self, id: JobId) -> Result<Job> {
        let conn = get_conn(&self.pool)?;
        jobs::complete_job(&conn, id)
    }

    fn fail(&self, id: JobId, reason: &str, retry_at: Option<DateTime<Utc>>) -> Result<Job> {
        let conn = get_conn(&self.pool)?;
        jobs::fail_job(&conn, id, reason, retry_at)
    }

    fn fail_stale(
        &self,
        id: JobId,
        reason: &str,
        retry_at: Option<DateTime<Utc>>,
        seen_heartbeat: &str,
    ) -> Result<Option<Job>> {
        let conn = get_conn(&self.pool)?;
        jobs::fail_stale_job(&conn, id, reason, retry_at, seen_heartbeat)
    }

    fn touch(&self, id: JobId) -> Result<bool> {
        let conn = get_conn(&self.pool)?;
        jobs::touch_job(&conn, id)
    }

    fn find_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>> {
        let conn = get_conn(&self.pool)?;
        jobs::find_stale_jobs(&conn, cutoff)
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let conn = get_conn(&self.pool)?;
        jobs::list_jobs(&conn, filter)
    }

    fn counts(&self, job_type: Option<&str>) -> Result<JobCounts> {
        let conn = get_conn(&self.pool)?;
        jobs::count_jobs(&conn, job_type)
    }

    fn remove(&self, id: JobId) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        if jobs::delete_job(&conn, id)? {
            Ok(())
        } else {
            Err(Error::not_found("job", id))
        }
    }

    fn purge_completed(&self) -> Result<usize> {
        let conn = get_conn(&self.pool)?;
        jobs::purge_completed(&conn)
    }
}

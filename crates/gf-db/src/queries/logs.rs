//! Append-only job log operations.

use gf_core::{Error, JobId, Result};
use rusqlite::{Connection, OptionalExtension};

use super::db_err;
use crate::models::{now_ts, LogEntry};

/// Append a timestamped message to a job's log.
pub fn append_log(conn: &Connection, id: JobId, message: &str) -> Result<LogEntry> {
    conn.query_row(
        "INSERT INTO job_logs (job_id, logged_at, message)
         SELECT id, ?2, ?3 FROM jobs WHERE id = ?1
         RETURNING id, job_id, logged_at, message",
        rusqlite::params![id.get(), now_ts(), message],
        LogEntry::from_row,
    )
    .optional()
    .map_err(db_err)?
    .ok_or_else(|| Error::not_found("job", id))
}

/// All log entries of a job in append order.
pub fn list_logs(conn: &Connection, id: JobId) -> Result<Vec<LogEntry>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, job_id, logged_at, message FROM job_logs
             WHERE job_id = ?1 ORDER BY id ASC",
        )
        .map_err(db_err)?;
    let rows = stmt
        .query_map([id.get()], LogEntry::from_row)
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::jobs::{create_job, delete_job};
    use gf_core::{JobData, JobOptions};

    #[test]
    fn append_and_list_in_order() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let job = create_job(&conn, "t", &JobData::new(), &JobOptions::default()).unwrap();

        append_log(&conn, job.id, "first").unwrap();
        append_log(&conn, job.id, "second").unwrap();
        let entry = append_log(&conn, job.id, "third").unwrap();
        assert_eq!(entry.job_id, job.id);
        assert!(entry.to_string().ends_with("] third"));

        let messages: Vec<String> = list_logs(&conn, job.id)
            .unwrap()
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
    }

    #[test]
    fn append_to_unknown_job_is_not_found() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let err = append_log(&conn, JobId::new(31), "orphan").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn logs_are_removed_with_their_job() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let job = create_job(&conn, "t", &JobData::new(), &JobOptions::default()).unwrap();
        append_log(&conn, job.id, "gone soon").unwrap();
        delete_job(&conn, job.id).unwrap();
        assert!(list_logs(&conn, job.id).unwrap().is_empty());
    }
}

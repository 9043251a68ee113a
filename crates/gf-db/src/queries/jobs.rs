//! Job record operations.
//!
//! Every state change runs inside one immediate transaction that reads the
//! current state, validates the edge against [`JobState::transition`] and
//! writes the result, so concurrent writers on other connections can never
//! interleave between the check and the update.

use chrono::{DateTime, Utc};
use gf_core::{Error, JobData, JobId, JobOptions, JobState, Result};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};

use super::db_err;
use crate::models::{format_ts, now_ts, Job, JobCounts, JobFilter};

const COLS: &str = "id, job_type, data, priority, state, attempts_made, max_attempts,
    backoff, remove_on_complete, error, run_at, created_at, updated_at,
    started_at, completed_at";

fn encode_data(data: &JobData) -> Result<String> {
    serde_json::to_string(data).map_err(|e| Error::Internal(format!("encode job data: {e}")))
}

fn immediate(conn: &Connection) -> Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate).map_err(db_err)
}

/// Create a new job in `inactive`.
pub fn create_job(
    conn: &Connection,
    job_type: &str,
    data: &JobData,
    options: &JobOptions,
) -> Result<Job> {
    let now = now_ts();
    let q = format!(
        "INSERT INTO jobs (job_type, data, priority, state, max_attempts, backoff,
             remove_on_complete, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'inactive', ?4, ?5, ?6, ?7, ?7)
         RETURNING {COLS}"
    );
    conn.query_row(
        &q,
        rusqlite::params![
            job_type,
            encode_data(data)?,
            options.priority.rank(),
            options.max_attempts.max(1),
            options.backoff,
            options.remove_on_complete,
            &now,
        ],
        Job::from_row,
    )
    .map_err(db_err)
}

/// Get a job by ID.
pub fn get_job(conn: &Connection, id: JobId) -> Result<Option<Job>> {
    let q = format!("SELECT {COLS} FROM jobs WHERE id = ?1");
    conn.query_row(&q, [id.get()], Job::from_row)
        .optional()
        .map_err(db_err)
}

/// Merge `partial` into the job's data. Keys in `partial` overwrite, all
/// other keys are left untouched.
pub fn merge_job_data(conn: &Connection, id: JobId, partial: &JobData) -> Result<Job> {
    let tx = immediate(conn)?;

    let current: Option<String> = tx
        .query_row("SELECT data FROM jobs WHERE id = ?1", [id.get()], |row| {
            row.get(0)
        })
        .optional()
        .map_err(db_err)?;
    let Some(current) = current else {
        return Err(Error::not_found("job", id));
    };

    let mut data: JobData = serde_json::from_str(&current)
        .map_err(|e| Error::Internal(format!("decode job data for {id}: {e}")))?;
    for (key, value) in partial {
        data.insert(key.clone(), value.clone());
    }

    let q = format!("UPDATE jobs SET data = ?1, updated_at = ?2 WHERE id = ?3 RETURNING {COLS}");
    let job = tx
        .query_row(
            &q,
            rusqlite::params![encode_data(&data)?, now_ts(), id.get()],
            Job::from_row,
        )
        .map_err(db_err)?;

    tx.commit().map_err(db_err)?;
    Ok(job)
}

/// Move a job along the state machine, recording `reason` and `run_at` where
/// the target state keeps them.
fn transition(
    conn: &Connection,
    id: JobId,
    to: JobState,
    reason: Option<&str>,
    run_at: Option<&str>,
) -> Result<Job> {
    let tx = immediate(conn)?;

    let from: Option<String> = tx
        .query_row("SELECT state FROM jobs WHERE id = ?1", [id.get()], |row| {
            row.get(0)
        })
        .optional()
        .map_err(db_err)?;
    let Some(from) = from else {
        return Err(Error::not_found("job", id));
    };
    from.parse::<JobState>()?.transition(to)?;

    let now = now_ts();
    let set = match to {
        JobState::Active => {
            "state = 'active', attempts_made = attempts_made + 1, started_at = ?2,
             run_at = NULL, updated_at = ?2"
        }
        JobState::Complete => {
            "state = 'complete', completed_at = ?2, run_at = NULL, updated_at = ?2"
        }
        JobState::Failed => {
            "state = 'failed', error = COALESCE(?3, error), completed_at = ?2,
             run_at = NULL, updated_at = ?2"
        }
        JobState::Inactive => {
            "state = 'inactive', error = COALESCE(?3, error), run_at = ?4,
             started_at = NULL, updated_at = ?2"
        }
    };
    let q = format!("UPDATE jobs SET {set} WHERE id = ?1 RETURNING {COLS}");

    let job = match to {
        JobState::Active | JobState::Complete => {
            tx.query_row(&q, rusqlite::params![id.get(), &now], Job::from_row)
        }
        JobState::Failed => {
            tx.query_row(&q, rusqlite::params![id.get(), &now, reason], Job::from_row)
        }
        JobState::Inactive => tx.query_row(
            &q,
            rusqlite::params![id.get(), &now, reason, run_at],
            Job::from_row,
        ),
    }
    .map_err(db_err)?;

    tx.commit().map_err(db_err)?;
    Ok(job)
}

/// Set a job's state, validating the transition first.
pub fn set_job_state(conn: &Connection, id: JobId, to: JobState) -> Result<Job> {
    transition(conn, id, to, None, None)
}

/// Atomically claim the next dispatchable job of `job_type`.
///
/// Picks the highest priority, then the lowest id, among inactive jobs whose
/// `run_at` is unset or due. The claimed job is `active` with
/// `attempts_made` incremented.
pub fn claim_next(conn: &Connection, job_type: &str) -> Result<Option<Job>> {
    let now = now_ts();

    // SQLite RETURNING is supported since 3.35.
    let q = format!(
        "UPDATE jobs SET state = 'active', attempts_made = attempts_made + 1,
             started_at = ?2, run_at = NULL, updated_at = ?2
         WHERE id = (
             SELECT id FROM jobs
             WHERE job_type = ?1 AND state = 'inactive'
               AND (run_at IS NULL OR run_at <= ?2)
             ORDER BY priority DESC, id ASC LIMIT 1
         )
         RETURNING {COLS}"
    );

    conn.query_row(&q, rusqlite::params![job_type, &now], Job::from_row)
        .optional()
        .map_err(db_err)
}

/// Mark an active job as complete.
pub fn complete_job(conn: &Connection, id: JobId) -> Result<Job> {
    transition(conn, id, JobState::Complete, None, None)
}

/// Record a failure of an active job.
///
/// With `retry_at` the job returns to `inactive` and becomes dispatchable
/// again at that time; without it the job is `failed` for good.
pub fn fail_job(
    conn: &Connection,
    id: JobId,
    reason: &str,
    retry_at: Option<DateTime<Utc>>,
) -> Result<Job> {
    match retry_at {
        Some(at) => transition(
            conn,
            id,
            JobState::Inactive,
            Some(reason),
            Some(&format_ts(at)),
        ),
        None => transition(conn, id, JobState::Failed, Some(reason), None),
    }
}

/// Fail an active job only if its heartbeat is still `seen_heartbeat`.
///
/// Returns `None` without writing when the job has since completed, failed,
/// or sent a heartbeat.
pub fn fail_stale_job(
    conn: &Connection,
    id: JobId,
    reason: &str,
    retry_at: Option<DateTime<Utc>>,
    seen_heartbeat: &str,
) -> Result<Option<Job>> {
    let set = match retry_at {
        Some(_) => {
            "state = 'inactive', error = ?3, run_at = ?4, started_at = NULL, updated_at = ?2"
        }
        None => "state = 'failed', error = ?3, completed_at = ?2, run_at = ?4, updated_at = ?2",
    };
    let q = format!(
        "UPDATE jobs SET {set}
         WHERE id = ?1 AND state = 'active' AND updated_at = ?5
         RETURNING {COLS}"
    );
    conn.query_row(
        &q,
        rusqlite::params![id.get(), now_ts(), reason, retry_at.map(format_ts), seen_heartbeat],
        Job::from_row,
    )
    .optional()
    .map_err(db_err)
}

/// Refresh the heartbeat of an active job. Returns `false` when the job is
/// no longer active.
pub fn touch_job(conn: &Connection, id: JobId) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE jobs SET updated_at = ?1 WHERE id = ?2 AND state = 'active'",
            rusqlite::params![now_ts(), id.get()],
        )
        .map_err(db_err)?;
    Ok(n > 0)
}

/// Active jobs whose last heartbeat is older than `cutoff`.
pub fn find_stale_jobs(conn: &Connection, cutoff: DateTime<Utc>) -> Result<Vec<Job>> {
    let q = format!(
        "SELECT {COLS} FROM jobs WHERE state = 'active' AND updated_at < ?1 ORDER BY id ASC"
    );
    let mut stmt = conn.prepare(&q).map_err(db_err)?;
    let rows = stmt
        .query_map([format_ts(cutoff)], Job::from_row)
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(rows)
}

/// List jobs with optional type/state filters and pagination, in dispatch
/// order.
pub fn list_jobs(conn: &Connection, filter: &JobFilter) -> Result<Vec<Job>> {
    let mut clauses: Vec<String> = Vec::new();
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(ref t) = filter.job_type {
        params_vec.push(Box::new(t.clone()));
        clauses.push(format!("job_type = ?{}", params_vec.len()));
    }
    if let Some(state) = filter.state {
        params_vec.push(Box::new(state.as_str()));
        clauses.push(format!("state = ?{}", params_vec.len()));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    params_vec.push(Box::new(filter.limit));
    let limit_idx = params_vec.len();
    params_vec.push(Box::new(filter.offset));
    let offset_idx = params_vec.len();

    let q = format!(
        "SELECT {COLS} FROM jobs {where_sql}
         ORDER BY priority DESC, id ASC LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
    );

    let mut stmt = conn.prepare(&q).map_err(db_err)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|b| b.as_ref()).collect();
    let rows = stmt
        .query_map(params_refs.as_slice(), Job::from_row)
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(rows)
}

/// Count jobs per state, optionally restricted to one job type.
pub fn count_jobs(conn: &Connection, job_type: Option<&str>) -> Result<JobCounts> {
    let mut stmt = conn
        .prepare(
            "SELECT state, COUNT(*) FROM jobs
             WHERE (?1 IS NULL OR job_type = ?1)
             GROUP BY state",
        )
        .map_err(db_err)?;
    let rows = stmt
        .query_map([job_type], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;

    let mut counts = JobCounts::default();
    for (state, n) in rows {
        let n = n.max(0) as u64;
        match state.parse::<JobState>()? {
            JobState::Inactive => counts.inactive = n,
            JobState::Active => counts.active = n,
            JobState::Complete => counts.complete = n,
            JobState::Failed => counts.failed = n,
        }
    }

    let delayed: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM jobs
             WHERE (?1 IS NULL OR job_type = ?1)
               AND state = 'inactive' AND run_at IS NOT NULL AND run_at > ?2",
            rusqlite::params![job_type, now_ts()],
            |row| row.get(0),
        )
        .map_err(db_err)?;
    counts.delayed = delayed.max(0) as u64;

    Ok(counts)
}

/// Delete a job and its logs.
pub fn delete_job(conn: &Connection, id: JobId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM jobs WHERE id = ?1", [id.get()])
        .map_err(db_err)?;
    Ok(n > 0)
}

/// Delete completed jobs flagged `remove_on_complete`.
pub fn purge_completed(conn: &Connection) -> Result<usize> {
    conn.execute(
        "DELETE FROM jobs WHERE state = 'complete' AND remove_on_complete = 1",
        [],
    )
    .map_err(db_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use gf_core::Priority;
    use serde_json::json;

    fn data(value: serde_json::Value) -> JobData {
        value.as_object().cloned().unwrap()
    }

    fn opts(priority: Priority) -> JobOptions {
        JobOptions::default().priority(priority)
    }

    #[test]
    fn create_and_get() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let job = create_job(
            &conn,
            "converter-job",
            &data(json!({"uniqueID": "abc"})),
            &opts(Priority::High),
        )
        .unwrap();
        assert_eq!(job.state, JobState::Inactive);
        assert_eq!(job.attempts_made, 0);
        assert_eq!(job.priority, Priority::High);

        let found = get_job(&conn, job.id).unwrap().unwrap();
        assert_eq!(found.data_str("uniqueID"), Some("abc"));
        assert!(get_job(&conn, JobId::new(9999)).unwrap().is_none());
    }

    #[test]
    fn claim_orders_by_priority_then_id() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let empty = JobData::new();
        let low = create_job(&conn, "t", &empty, &opts(Priority::Low)).unwrap();
        let high_a = create_job(&conn, "t", &empty, &opts(Priority::High)).unwrap();
        let high_b = create_job(&conn, "t", &empty, &opts(Priority::High)).unwrap();
        let _other = create_job(&conn, "other", &empty, &opts(Priority::Critical)).unwrap();

        let first = claim_next(&conn, "t").unwrap().unwrap();
        assert_eq!(first.id, high_a.id);
        assert_eq!(first.state, JobState::Active);
        assert_eq!(first.attempts_made, 1);
        assert!(first.started_at.is_some());

        assert_eq!(claim_next(&conn, "t").unwrap().unwrap().id, high_b.id);
        assert_eq!(claim_next(&conn, "t").unwrap().unwrap().id, low.id);
        assert!(claim_next(&conn, "t").unwrap().is_none());
    }

    #[test]
    fn merge_preserves_other_keys() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let job = create_job(
            &conn,
            "t",
            &data(json!({"a": 1, "b": "keep"})),
            &JobOptions::default(),
        )
        .unwrap();

        let merged = merge_job_data(&conn, job.id, &data(json!({"a": 2, "c": null}))).unwrap();
        assert_eq!(merged.data.get("a"), Some(&json!(2)));
        assert_eq!(merged.data.get("b"), Some(&json!("keep")));
        assert_eq!(merged.data.get("c"), Some(&serde_json::Value::Null));

        let err = merge_job_data(&conn, JobId::new(404), &JobData::new()).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn merge_is_associative_last_write_wins() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let empty = JobData::new();
        let a = data(json!({"x": 1, "y": 1}));
        let b = data(json!({"y": 2, "z": 2}));
        let c = data(json!({"z": 3}));

        // (a <- b) <- c
        let j1 = create_job(&conn, "t", &empty, &JobOptions::default()).unwrap();
        merge_job_data(&conn, j1.id, &a).unwrap();
        merge_job_data(&conn, j1.id, &b).unwrap();
        let left = merge_job_data(&conn, j1.id, &c).unwrap();

        // a <- (b <- c)
        let mut bc = b.clone();
        bc.extend(c.clone());
        let j2 = create_job(&conn, "t", &empty, &JobOptions::default()).unwrap();
        merge_job_data(&conn, j2.id, &a).unwrap();
        let right = merge_job_data(&conn, j2.id, &bc).unwrap();

        assert_eq!(left.data, right.data);
        assert_eq!(left.data, data(json!({"x": 1, "y": 2, "z": 3})));
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let job = create_job(&conn, "t", &JobData::new(), &JobOptions::default()).unwrap();

        let err = complete_job(&conn, job.id).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: JobState::Inactive,
                to: JobState::Complete
            }
        ));

        set_job_state(&conn, job.id, JobState::Active).unwrap();
        let done = complete_job(&conn, job.id).unwrap();
        assert_eq!(done.state, JobState::Complete);
        assert!(done.completed_at.is_some());

        for to in JobState::ALL {
            assert!(set_job_state(&conn, job.id, to).is_err());
        }
        let err = set_job_state(&conn, JobId::new(77), JobState::Active).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn fail_with_retry_delays_redispatch() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let job = create_job(&conn, "t", &JobData::new(), &JobOptions::default().attempts(2))
            .unwrap();
        claim_next(&conn, "t").unwrap().unwrap();

        let later = Utc::now() + chrono::Duration::hours(1);
        let delayed = fail_job(&conn, job.id, "boom", Some(later)).unwrap();
        assert_eq!(delayed.state, JobState::Inactive);
        assert_eq!(delayed.error.as_deref(), Some("boom"));
        assert!(delayed.is_delayed());
        assert!(claim_next(&conn, "t").unwrap().is_none());

        let counts = count_jobs(&conn, Some("t")).unwrap();
        assert_eq!(counts.inactive, 1);
        assert_eq!(counts.delayed, 1);

        // Make the retry due.
        conn.execute(
            "UPDATE jobs SET run_at = ?1 WHERE id = ?2",
            rusqlite::params![format_ts(Utc::now() - chrono::Duration::seconds(1)), job.id.get()],
        )
        .unwrap();
        let again = claim_next(&conn, "t").unwrap().unwrap();
        assert_eq!(again.attempts_made, 2);
        assert!(again.run_at.is_none());

        let failed = fail_job(&conn, job.id, "boom again", None).unwrap();
        assert_eq!(failed.state, JobState::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom again"));
    }

    #[test]
    fn fail_stale_skips_jobs_that_moved_on() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let job = create_job(&conn, "t", &JobData::new(), &JobOptions::default()).unwrap();
        let seen = claim_next(&conn, "t").unwrap().unwrap();

        // A heartbeat after the snapshot keeps the job alive.
        conn.execute(
            "UPDATE jobs SET updated_at = ?1 WHERE id = ?2",
            rusqlite::params![format_ts(Utc::now() + chrono::Duration::seconds(1)), job.id.get()],
        )
        .unwrap();
        assert!(fail_stale_job(&conn, job.id, "stalled", None, &seen.updated_at)
            .unwrap()
            .is_none());
        assert_eq!(get_job(&conn, job.id).unwrap().unwrap().state, JobState::Active);

        // A completion after the snapshot is never overwritten.
        let fresh = get_job(&conn, job.id).unwrap().unwrap();
        complete_job(&conn, job.id).unwrap();
        assert!(fail_stale_job(&conn, job.id, "stalled", None, &fresh.updated_at)
            .unwrap()
            .is_none());
        let after = get_job(&conn, job.id).unwrap().unwrap();
        assert_eq!(after.state, JobState::Complete);
        assert!(after.error.is_none());
    }

    #[test]
    fn fail_stale_applies_the_retry_policy_to_an_unchanged_job() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let job = create_job(&conn, "t", &JobData::new(), &JobOptions::default().attempts(2))
            .unwrap();
        let seen = claim_next(&conn, "t").unwrap().unwrap();

        let later = Utc::now() + chrono::Duration::hours(1);
        let delayed = fail_stale_job(&conn, job.id, "stalled", Some(later), &seen.updated_at)
            .unwrap()
            .unwrap();
        assert_eq!(delayed.state, JobState::Inactive);
        assert_eq!(delayed.error.as_deref(), Some("stalled"));
        assert!(delayed.is_delayed());
        assert!(delayed.started_at.is_none());

        conn.execute(
            "UPDATE jobs SET run_at = NULL WHERE id = ?1",
            [job.id.get()],
        )
        .unwrap();
        let again = claim_next(&conn, "t").unwrap().unwrap();
        let failed = fail_stale_job(&conn, job.id, "stalled again", None, &again.updated_at)
            .unwrap()
            .unwrap();
        assert_eq!(failed.state, JobState::Failed);
        assert!(failed.run_at.is_none());
        assert!(failed.completed_at.is_some());
    }

    #[test]
    fn touch_only_refreshes_active_jobs() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let job = create_job(&conn, "t", &JobData::new(), &JobOptions::default()).unwrap();
        assert!(!touch_job(&conn, job.id).unwrap());
        claim_next(&conn, "t").unwrap();
        assert!(touch_job(&conn, job.id).unwrap());
    }

    #[test]
    fn stale_scan_uses_heartbeat() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let stale = create_job(&conn, "t", &JobData::new(), &JobOptions::default()).unwrap();
        let fresh = create_job(&conn, "t", &JobData::new(), &JobOptions::default()).unwrap();
        claim_next(&conn, "t").unwrap();
        claim_next(&conn, "t").unwrap();

        conn.execute(
            "UPDATE jobs SET updated_at = ?1 WHERE id = ?2",
            rusqlite::params![format_ts(Utc::now() - chrono::Duration::minutes(5)), stale.id.get()],
        )
        .unwrap();

        let found = find_stale_jobs(&conn, Utc::now() - chrono::Duration::minutes(1)).unwrap();
        let ids: Vec<JobId> = found.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![stale.id]);
        assert!(!ids.contains(&fresh.id));
    }

    #[test]
    fn list_with_filter() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        create_job(&conn, "a", &JobData::new(), &JobOptions::default()).unwrap();
        create_job(&conn, "a", &JobData::new(), &JobOptions::default()).unwrap();
        create_job(&conn, "b", &JobData::new(), &JobOptions::default()).unwrap();
        claim_next(&conn, "a").unwrap();

        assert_eq!(list_jobs(&conn, &JobFilter::default()).unwrap().len(), 3);
        assert_eq!(
            list_jobs(&conn, &JobFilter::default().job_type("a")).unwrap().len(),
            2
        );
        let active = list_jobs(&conn, &JobFilter::default().state(JobState::Active)).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].job_type, "a");

        let page = JobFilter {
            limit: 1,
            offset: 1,
            ..JobFilter::default()
        };
        assert_eq!(list_jobs(&conn, &page).unwrap().len(), 1);
    }

    #[test]
    fn purge_only_flagged_complete_jobs() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let keep = create_job(&conn, "t", &JobData::new(), &JobOptions::default()).unwrap();
        let purged = create_job(
            &conn,
            "t",
            &JobData::new(),
            &JobOptions::default().remove_on_complete(true),
        )
        .unwrap();
        for _ in 0..2 {
            let job = claim_next(&conn, "t").unwrap().unwrap();
            complete_job(&conn, job.id).unwrap();
        }

        assert_eq!(purge_completed(&conn).unwrap(), 1);
        assert!(get_job(&conn, keep.id).unwrap().is_some());
        assert!(get_job(&conn, purged.id).unwrap().is_none());

        assert!(delete_job(&conn, keep.id).unwrap());
        assert!(!delete_job(&conn, keep.id).unwrap());
        assert_eq!(count_jobs(&conn, None).unwrap().total(), 0);
    }
}

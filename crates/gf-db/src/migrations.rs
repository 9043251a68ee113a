//! Embedded SQL migrations and runner.
//!
//! Migrations are stored as `&str` constants and executed in order. A
//! `schema_migrations` table tracks which versions have been applied.

use gf_core::{Error, Result};
use rusqlite::Connection;

/// V1: job records and their append-only logs.
const V1_INITIAL: &str = r#"
CREATE TABLE jobs (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    job_type           TEXT NOT NULL,
    data               TEXT NOT NULL DEFAULT '{}',
    priority           INTEGER NOT NULL DEFAULT 0,
    state              TEXT NOT NULL DEFAULT 'inactive',
    attempts_made      INTEGER NOT NULL DEFAULT 0,
    max_attempts       INTEGER NOT NULL DEFAULT 1,
    backoff            INTEGER NOT NULL DEFAULT 0,
    remove_on_complete INTEGER NOT NULL DEFAULT 0,
    error              TEXT,
    run_at             TEXT,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL,
    started_at         TEXT,
    completed_at       TEXT
);

CREATE TABLE job_logs (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id    INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
    logged_at TEXT NOT NULL,
    message   TEXT NOT NULL
);

CREATE INDEX idx_job_logs_job ON job_logs(job_id, id);
"#;

/// V2: indexes for dispatch ordering and the stale-job scan.
const V2_DISPATCH_INDEXES: &str = r#"
CREATE INDEX idx_jobs_dispatch ON jobs(job_type, state, priority DESC, id ASC);
CREATE INDEX idx_jobs_state_updated ON jobs(state, updated_at);
"#;

/// Ordered list of (version, sql) pairs.
const MIGRATIONS: &[(i64, &str)] = &[(1, V1_INITIAL), (2, V2_DISPATCH_INDEXES)];

/// Run all pending migrations on `conn`.
///
/// Creates the `schema_migrations` tracking table if it does not exist,
/// then applies each outstanding migration inside a transaction.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::persistence(format!("Failed to create schema_migrations: {e}")))?;

    for &(version, sql) in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .map_err(|e| Error::persistence(e.to_string()))?;

        if already {
            continue;
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::persistence(e.to_string()))?;

        tx.execute_batch(sql)
            .map_err(|e| Error::persistence(format!("Migration V{version} failed: {e}")))?;

        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| Error::persistence(e.to_string()))?;

        tx.commit().map_err(|e| Error::persistence(e.to_string()))?;

        tracing::debug!(version, "Applied migration");
    }

    Ok(())
}

//! Stuck-job watchdog and startup recovery.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use gf_core::{Error, JobState, Result};
use gf_db::{Job, JobFilter};
use tokio::time::MissedTickBehavior;

use crate::engine::Inner;

/// Periodically reclaim active jobs whose heartbeat went quiet. Stops when
/// dispatch is cancelled.
pub(crate) async fn run(inner: Arc<Inner>, every: Duration) {
    tracing::info!(
        interval_ms = every.as_millis() as u64,
        stale_after_ms = inner.settings.stale_after.as_millis() as u64,
        "Watchdog started"
    );

    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.reset();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = inner.dispatch_cancel.cancelled() => break,
        }

        match inner.reclaim_stale() {
            Ok(0) => {}
            Ok(n) => tracing::warn!(count = n, "Reclaimed stale jobs"),
            Err(e) => tracing::error!(error = %e, "Watchdog scan failed"),
        }
    }

    tracing::info!("Watchdog stopped");
}

/// Seconds since the job's last heartbeat.
fn silent_for(job: &Job, now: DateTime<Utc>) -> u64 {
    DateTime::parse_from_rfc3339(&job.updated_at)
        .map(|at| (now - at.with_timezone(&Utc)).num_seconds().max(0) as u64)
        .unwrap_or(0)
}

impl Inner {
    /// Reclaim every active job whose heartbeat is older than `stale_after`.
    pub(crate) fn reclaim_stale(&self) -> Result<usize> {
        let now = Utc::now();
        let window = chrono::Duration::from_std(self.settings.stale_after)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let stale = self.store.find_stale(now - window)?;

        for job in &stale {
            tracing::warn!(
                job_id = %job.id,
                job_type = %job.job_type,
                last_heartbeat = %job.updated_at,
                "Job stalled"
            );
            self.reclaim(job, Error::Stalled(silent_for(job, now)));
        }
        Ok(stale.len())
    }

    /// Reclassify jobs a crashed previous process left `active`.
    pub(crate) fn recover_orphans(&self) -> Result<usize> {
        let filter = JobFilter {
            state: Some(JobState::Active),
            limit: i64::MAX,
            ..JobFilter::default()
        };
        let orphans = self.store.list(&filter)?;
        let now = Utc::now();

        for job in &orphans {
            tracing::warn!(job_id = %job.id, job_type = %job.job_type, "Recovering orphaned job");
            self.reclaim(job, Error::Stalled(silent_for(job, now)));
        }
        Ok(orphans.len())
    }

    /// Take ownership of `job` from its local worker, if any, cancel that
    /// worker and apply the failure policy.
    ///
    /// A job with no local worker belongs to another process or to none; it
    /// is failed only if its record is unchanged since the scan.
    fn reclaim(&self, job: &Job, reason: Error) {
        let message = format!("Job reclaimed by watchdog: {reason}");
        if let Some((_, token)) = self.in_flight.remove(&job.id) {
            token.cancel();
            self.append_log(job.id, &message);
            self.record_failure(job, &reason);
            return;
        }
        if self.settling.contains(&job.id) {
            tracing::debug!(job_id = %job.id, "Job is being settled by its worker");
            return;
        }
        if self.record_stale_failure(job, &reason) {
            self.append_log(job.id, &message);
        }
    }
}
